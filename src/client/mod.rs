pub mod google_play;

pub use google_play::GooglePlayClient;
