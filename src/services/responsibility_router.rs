//! Decides which producer must correct a set of validation errors.

use chrono::Utc;

use crate::domain::models::{FeedbackPayload, ResponsibleParty, ValidationError};

/// Counts of owned errors per party. Unowned kinds are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipTally {
    pub flow: usize,
    pub structure: usize,
}

impl OwnershipTally {
    pub fn of(errors: &[ValidationError]) -> Self {
        errors
            .iter()
            .fold(Self::default(), |mut tally, error| {
                match error.kind.owner() {
                    Some(ResponsibleParty::Flow) => tally.flow += 1,
                    Some(ResponsibleParty::Structure) => tally.structure += 1,
                    None => {}
                }
                tally
            })
    }

    /// The party with strictly more errors. A non-zero tie goes to flow,
    /// since structure dependencies are derived from flows.
    pub fn responsible(&self) -> Option<ResponsibleParty> {
        if self.flow > self.structure {
            Some(ResponsibleParty::Flow)
        } else if self.structure > self.flow {
            Some(ResponsibleParty::Structure)
        } else if self.flow > 0 {
            Some(ResponsibleParty::Flow)
        } else {
            None
        }
    }
}

pub fn determine_responsible_party(errors: &[ValidationError]) -> Option<ResponsibleParty> {
    OwnershipTally::of(errors).responsible()
}

/// Builds the correction request for `party`, keeping only the errors it owns.
pub fn prepare_feedback(party: ResponsibleParty, errors: &[ValidationError]) -> FeedbackPayload {
    let relevant: Vec<ValidationError> = errors
        .iter()
        .filter(|error| error.kind.owner() == Some(party))
        .cloned()
        .collect();

    FeedbackPayload {
        agent_type: party,
        error_count: relevant.len(),
        correction_required: !relevant.is_empty(),
        errors: relevant,
        timestamp: Utc::now(),
    }
}

/// Picks the responsible party and prepares its feedback in one step.
pub fn route(errors: &[ValidationError]) -> Option<FeedbackPayload> {
    let party = determine_responsible_party(errors)?;
    let feedback = prepare_feedback(party, errors);
    tracing::info!(
        party = %party,
        error_count = feedback.error_count,
        "Routing validation errors for correction"
    );
    Some(feedback)
}
