//! E-mail identity registry.

use chrono::Utc;
use serde_json::Value as JsonValue;

use radmem_core::{patient_id_for_email, Error, NamedVectors, PatientProfile, Result};

use crate::records::Records;

#[derive(Clone)]
pub struct PatientRepository {
    records: Records<PatientProfile>,
}

impl PatientRepository {
    pub fn new(records: Records<PatientProfile>) -> Self {
        Self { records }
    }

    /// Register (or refresh) an e-mail identity and return its profile.
    ///
    /// The patient id is derived from the e-mail, so re-registering returns
    /// the same id and keeps the original registration time.
    pub async fn register(&self, email: &str, metadata: JsonValue) -> Result<PatientProfile> {
        let email = email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid e-mail: {:?}", email)));
        }
        let patient_id = patient_id_for_email(&email);
        let registered_at = match self.records.get(patient_id).await? {
            Some(existing) => existing.registered_at,
            None => Utc::now(),
        };
        let profile = PatientProfile {
            patient_id,
            email,
            metadata,
            registered_at,
        };
        self.records.upsert(&profile, NamedVectors::default()).await?;
        Ok(profile)
    }
}
