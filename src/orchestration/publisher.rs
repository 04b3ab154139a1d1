//! Edit Publisher - runs one edit from creation to commit or delete
//!
//! The sequence is strictly linear:
//! - create an edit for the package
//! - upload the bundle into it
//! - point the alpha track at the uploaded version code
//! - commit the edit, or delete it when committing is not requested
//!
//! Every step except the final delete is fatal. A failure after the edit
//! was created leaves it unfinished on the server.

use crate::core::config::PublisherConfig;
use crate::core::error::{ApiError, PublishError};
use crate::core::state_machine::{EditState, EditStateMachine};
use crate::core::traits::{ALPHA_TRACK, AppEdit, PublishingApi, Track};
use std::fmt;
use tokio::fs::File;

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The edit was committed; carries the commit confirmation
    Committed(AppEdit),

    /// The edit was deleted; carries the delete error, if any
    Aborted(Option<ApiError>),
}

impl PublishOutcome {
    /// The single line printed when the run finishes
    pub fn report_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed(edit) => write!(f, "commited edit successfully, {}", edit),
            Self::Aborted(Some(error)) => write!(f, "edit aborted with err: {}", error),
            Self::Aborted(None) => write!(f, "edit aborted with err: <nil>"),
        }
    }
}

/// Runs the publishing sequence against a [`PublishingApi`]
pub struct EditPublisher<'a, A: PublishingApi + ?Sized> {
    api: &'a A,
    state_machine: EditStateMachine,
}

impl<'a, A: PublishingApi + ?Sized> EditPublisher<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            state_machine: EditStateMachine::new(),
        }
    }

    /// Lifecycle of the edit handled by this publisher
    pub fn state_machine(&self) -> &EditStateMachine {
        &self.state_machine
    }

    /// Publish `bundle` for the configured package
    pub async fn publish(
        &mut self,
        config: &PublisherConfig,
        bundle: File,
    ) -> Result<PublishOutcome, PublishError> {
        let package = config.package_name.as_str();

        let edit = self
            .api
            .create_edit(package)
            .await
            .map_err(PublishError::CreateEdit)?;
        self.state_machine
            .transition(EditState::EditCreated, Some(edit.id.clone()))?;
        log::info!("created edit {}", edit.id);

        let uploaded = self
            .api
            .upload_bundle(package, &edit.id, bundle)
            .await
            .map_err(PublishError::Upload)?;
        self.state_machine.transition(
            EditState::BundleUploaded,
            Some(format!("version code {}", uploaded.version_code)),
        )?;
        log::info!("uploaded bundle with version code {}", uploaded.version_code);

        let track = Track::single_release(ALPHA_TRACK, uploaded.version_code);
        self.api
            .update_track(package, &edit.id, track)
            .await
            .map_err(PublishError::UpdateTrack)?;
        self.state_machine
            .transition(EditState::TrackUpdated, Some(ALPHA_TRACK.to_string()))?;
        log::info!(
            "assigned version code {} to track {}",
            uploaded.version_code,
            ALPHA_TRACK
        );

        let outcome = if config.commit {
            let committed = self
                .api
                .commit_edit(package, &edit.id)
                .await
                .map_err(PublishError::Commit)?;
            self.state_machine.transition(EditState::Committed, None)?;
            PublishOutcome::Committed(committed)
        } else {
            // Delete failures are reported, never fatal.
            let result = self.api.delete_edit(package, &edit.id).await;
            if let Err(ref error) = result {
                log::warn!("failed to delete edit {}: {}", edit.id, error);
            }
            self.state_machine.transition(EditState::Aborted, None)?;
            PublishOutcome::Aborted(result.err())
        };

        log::debug!(
            "edit finished in {}ms\n{}",
            self.state_machine.get_elapsed_time(),
            self.state_machine.get_history()
        );

        Ok(outcome)
    }
}
