//! Record operations shared by the REST and FHIR routes.
//!
//! Every write goes through [`RecordService`], which enforces the integrity
//! rules the store itself knows nothing about: the patient profile limit,
//! references to existing patients and observations, and cascading deletes.

use std::collections::HashMap;

use bloodwork_ai::PatientRecords;
use bloodwork_api::ApiError;
use bloodwork_core::{
    CoreError, DiagnosticReport, DomainRecord, Observation, RecordId, RecordKind,
};
use bloodwork_fhir::terminology;
use bloodwork_storage::{DynRecordStore, RecordFilter, RecordStore, RecordStoreExt};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::ApiResultExt;
use crate::search::SearchQuery;

pub struct RecordService {
    store: DynRecordStore,
    max_profiles: usize,
    strict_codes: bool,
    // Held across the check-then-write sequences below.
    writes: Mutex<()>,
}

impl std::fmt::Debug for RecordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordService")
            .field("backend", &self.store.backend_name())
            .field("max_profiles", &self.max_profiles)
            .field("strict_codes", &self.strict_codes)
            .finish()
    }
}

fn not_found(kind: RecordKind, id: RecordId) -> ApiError {
    ApiError::not_found(format!("{kind}/{id} not found"))
}

impl RecordService {
    pub fn new(store: DynRecordStore, cfg: &AppConfig) -> Self {
        Self {
            store,
            max_profiles: cfg.patients.max_profiles,
            strict_codes: cfg.validation.strict_codes,
            writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &DynRecordStore {
        &self.store
    }

    pub async fn get(&self, kind: RecordKind, id: RecordId) -> Result<DomainRecord, ApiError> {
        self.store
            .load(kind, id)
            .await
            .api()?
            .ok_or_else(|| not_found(kind, id))
    }

    /// Store a new record. Any id on the input is discarded.
    pub async fn create(&self, record: DomainRecord) -> Result<DomainRecord, ApiError> {
        let _guard = self.writes.lock().await;
        self.create_locked(record).await
    }

    async fn create_locked(&self, record: DomainRecord) -> Result<DomainRecord, ApiError> {
        let record = strip_id(record);
        self.check(&record).await?;
        if record.kind() == RecordKind::Patient {
            let existing = self.store.count(RecordKind::Patient).await.api()?;
            if existing >= self.max_profiles {
                return Err(CoreError::ProfileLimit {
                    limit: self.max_profiles,
                })
                .api();
            }
        }
        let saved = self.store.save(record).await.api()?;
        tracing::info!(kind = %saved.kind(), id = ?saved.id(), "record created");
        Ok(saved)
    }

    /// Replace the record stored under `id`.
    pub async fn update(
        &self,
        id: RecordId,
        record: DomainRecord,
    ) -> Result<DomainRecord, ApiError> {
        let _guard = self.writes.lock().await;
        let previous = self.load_existing(record.kind(), id).await?;
        self.update_locked(id, &previous, record).await
    }

    /// Read, edit and write back a record as one step, so concurrent patches
    /// cannot overwrite each other.
    pub async fn patch<F>(
        &self,
        kind: RecordKind,
        id: RecordId,
        edit: F,
    ) -> Result<DomainRecord, ApiError>
    where
        F: FnOnce(&DomainRecord) -> Result<DomainRecord, ApiError>,
    {
        let _guard = self.writes.lock().await;
        let previous = self.load_existing(kind, id).await?;
        let record = edit(&previous)?;
        if record.kind() != kind {
            return Err(ApiError::invalid("resourceType", format!("must stay {kind}")));
        }
        self.update_locked(id, &previous, record).await
    }

    async fn load_existing(
        &self,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<DomainRecord, ApiError> {
        self.store
            .load(kind, id)
            .await
            .api()?
            .ok_or_else(|| not_found(kind, id))
    }

    async fn update_locked(
        &self,
        id: RecordId,
        previous: &DomainRecord,
        mut record: DomainRecord,
    ) -> Result<DomainRecord, ApiError> {
        let kind = record.kind();
        record.set_id(id);
        self.check(&record).await?;

        if let (DomainRecord::Observation(old), DomainRecord::Observation(new)) =
            (previous, &record)
            && old.patient_id != new.patient_id
        {
            self.detach_observation(old.patient_id, id).await?;
        }

        let saved = self.store.save(record).await.api()?;
        tracing::info!(kind = %kind, id, "record updated");
        Ok(saved)
    }

    /// Delete a record and whatever depends on it.
    ///
    /// A patient takes its observations and reports with it; an observation
    /// is removed from the `result` list of every report citing it.
    pub async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<(), ApiError> {
        let _guard = self.writes.lock().await;
        let record = self.load_existing(kind, id).await?;

        match &record {
            DomainRecord::Patient(_) => {
                let owned = RecordFilter::new().with_patient(id);
                let observations = self
                    .store
                    .delete_matching(RecordKind::Observation, &owned)
                    .await
                    .api()?;
                let reports = self
                    .store
                    .delete_matching(RecordKind::DiagnosticReport, &owned)
                    .await
                    .api()?;
                tracing::info!(
                    patient_id = id,
                    observations,
                    reports,
                    "cascading patient delete"
                );
            }
            DomainRecord::Observation(obs) => self.detach_observation(obs.patient_id, id).await?,
            DomainRecord::DiagnosticReport(_) => {}
        }

        self.store.delete(kind, id).await.api()?;
        tracing::info!(kind = %kind, id, "record deleted");
        Ok(())
    }

    /// All matching records in result order, plus the requested page.
    pub async fn search(
        &self,
        kind: RecordKind,
        query: &SearchQuery,
    ) -> Result<(usize, Vec<DomainRecord>), ApiError> {
        let mut matches = self.store.query(kind, &query.filter).await.api()?;
        if kind != RecordKind::Patient {
            matches.sort_by_key(|r| (r.effective_datetime(), r.id()));
        }
        let total = matches.len();
        let page = query.paginate(matches);
        tracing::debug!(kind = %kind, total, returned = page.len(), "search");
        Ok((total, page))
    }

    pub async fn patient_records(&self, patient_id: RecordId) -> Result<PatientRecords, ApiError> {
        let patient = self
            .store
            .load_patient(patient_id)
            .await
            .api()?
            .ok_or_else(|| not_found(RecordKind::Patient, patient_id))?;
        let owned = RecordFilter::new().with_patient(patient_id);
        let observations = self.store.observations(&owned).await.api()?;
        let reports = self.store.reports(&owned).await.api()?;
        Ok(PatientRecords {
            patient,
            observations,
            reports,
        })
    }

    /// Import the records of a Bundle as a unit.
    ///
    /// Patients whose id already exists are updated in place; all other
    /// records are created with fresh ids. References from observations and
    /// reports to records of the same Bundle are rewritten to the stored ids.
    /// When any entry fails, every write made for the Bundle is undone.
    pub async fn import_bundle(
        &self,
        records: Vec<DomainRecord>,
    ) -> Result<Vec<DomainRecord>, ApiError> {
        let _guard = self.writes.lock().await;
        let mut journal = Vec::new();
        match self.import_locked(records, &mut journal).await {
            Ok(stored) => {
                tracing::info!(imported = stored.len(), "bundle imported");
                Ok(stored)
            }
            Err(err) => {
                tracing::warn!(error = %err, undone = journal.len(), "bundle import failed");
                self.undo(journal).await;
                Err(err)
            }
        }
    }

    async fn import_locked(
        &self,
        records: Vec<DomainRecord>,
        journal: &mut Vec<Undo>,
    ) -> Result<Vec<DomainRecord>, ApiError> {
        let mut patients: HashMap<RecordId, RecordId> = HashMap::new();
        let mut observations: HashMap<RecordId, RecordId> = HashMap::new();
        let mut stored = Vec::with_capacity(records.len());

        // Patients first so that clinical records can point at them.
        let (patient_entries, clinical): (Vec<_>, Vec<_>) = records
            .into_iter()
            .enumerate()
            .partition(|(_, r)| r.kind() == RecordKind::Patient);

        for (index, record) in patient_entries {
            let bundle_id = record.id();
            let previous = match bundle_id {
                Some(id) => self.store.load(RecordKind::Patient, id).await.api()?,
                None => None,
            };
            let saved = match previous {
                Some(previous) => {
                    record.validate().api().map_err(|e| prefix_entry(e, index))?;
                    let saved = self.store.save(record).await.api()?;
                    journal.push(Undo::Restore(previous));
                    saved
                }
                None => self.create_journaled(record, index, journal).await?,
            };
            if let (Some(from), Some(to)) = (bundle_id, saved.id()) {
                patients.insert(from, to);
            }
            stored.push(saved);
        }

        let (observation_entries, report_entries): (Vec<_>, Vec<_>) = clinical
            .into_iter()
            .partition(|(_, r)| r.kind() == RecordKind::Observation);

        for (index, record) in observation_entries {
            let DomainRecord::Observation(mut obs) = record else {
                continue;
            };
            let bundle_id = obs.id;
            if let Some(&mapped) = patients.get(&obs.patient_id) {
                obs.patient_id = mapped;
            }
            let saved = self.create_journaled(obs.into(), index, journal).await?;
            if let (Some(from), Some(to)) = (bundle_id, saved.id()) {
                observations.insert(from, to);
            }
            stored.push(saved);
        }

        for (index, record) in report_entries {
            let DomainRecord::DiagnosticReport(mut report) = record else {
                continue;
            };
            if let Some(&mapped) = patients.get(&report.patient_id) {
                report.patient_id = mapped;
            }
            for result in &mut report.result {
                if let Some(&mapped) = observations.get(result) {
                    *result = mapped;
                }
            }
            stored.push(self.create_journaled(report.into(), index, journal).await?);
        }

        Ok(stored)
    }

    async fn create_journaled(
        &self,
        record: DomainRecord,
        index: usize,
        journal: &mut Vec<Undo>,
    ) -> Result<DomainRecord, ApiError> {
        let saved = self
            .create_locked(record)
            .await
            .map_err(|e| prefix_entry(e, index))?;
        if let Some(id) = saved.id() {
            journal.push(Undo::Remove(saved.kind(), id));
        }
        Ok(saved)
    }

    /// Revert journaled writes, newest first.
    async fn undo(&self, journal: Vec<Undo>) {
        for step in journal.into_iter().rev() {
            let outcome = match step {
                Undo::Remove(kind, id) => self.store.delete(kind, id).await.map(drop),
                Undo::Restore(record) => self.store.save(record).await.map(drop),
            };
            if let Err(e) = outcome {
                tracing::error!(error = %e, "could not undo bundle import write");
            }
        }
    }

    /// Validate a record and its references before it is written.
    async fn check(&self, record: &DomainRecord) -> Result<(), ApiError> {
        record.validate().api()?;
        match record {
            DomainRecord::Patient(_) => Ok(()),
            DomainRecord::Observation(obs) => {
                self.require_patient(obs.patient_id).await?;
                if self.strict_codes {
                    check_codes(obs)?;
                }
                Ok(())
            }
            DomainRecord::DiagnosticReport(report) => {
                self.require_patient(report.patient_id).await?;
                self.check_results(report).await
            }
        }
    }

    async fn require_patient(&self, patient_id: RecordId) -> Result<(), ApiError> {
        if self.store.patient_exists(patient_id).await.api()? {
            Ok(())
        } else {
            Err(not_found(RecordKind::Patient, patient_id))
        }
    }

    async fn check_results(&self, report: &DiagnosticReport) -> Result<(), ApiError> {
        for (i, &obs_id) in report.result.iter().enumerate() {
            let path = format!("result[{i}]");
            match self.store.load_observation(obs_id).await.api()? {
                None => {
                    return Err(ApiError::invalid(
                        path,
                        format!("Observation/{obs_id} does not exist"),
                    ));
                }
                Some(obs) if obs.patient_id != report.patient_id => {
                    return Err(ApiError::invalid(
                        path,
                        format!(
                            "Observation/{obs_id} belongs to Patient/{}, not Patient/{}",
                            obs.patient_id, report.patient_id
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Drop `obs_id` from the results of the patient's reports.
    async fn detach_observation(
        &self,
        patient_id: RecordId,
        obs_id: RecordId,
    ) -> Result<(), ApiError> {
        let owned = RecordFilter::new().with_patient(patient_id);
        for mut report in self.store.reports(&owned).await.api()? {
            if report.result.contains(&obs_id) {
                report.result.retain(|&r| r != obs_id);
                tracing::debug!(report_id = ?report.id, obs_id, "detaching observation from report");
                self.store.save(report.into()).await.api()?;
            }
        }
        Ok(())
    }
}

/// A write made while importing a Bundle.
enum Undo {
    Remove(RecordKind, RecordId),
    Restore(DomainRecord),
}

fn strip_id(record: DomainRecord) -> DomainRecord {
    match record {
        DomainRecord::Patient(mut p) => {
            p.id = None;
            p.into()
        }
        DomainRecord::Observation(mut o) => {
            o.id = None;
            o.into()
        }
        DomainRecord::DiagnosticReport(mut r) => {
            r.id = None;
            r.into()
        }
    }
}

fn check_codes(obs: &Observation) -> Result<(), ApiError> {
    terminology::validate_loinc(&obs.code).map_err(|msg| ApiError::invalid("code", msg))?;
    if let Some(unit) = &obs.unit {
        terminology::validate_ucum(unit).map_err(|msg| ApiError::invalid("unit", msg))?;
    }
    Ok(())
}

fn prefix_entry(err: ApiError, index: usize) -> ApiError {
    match err {
        ApiError::Invalid { path, message } => {
            ApiError::invalid(format!("entry[{index}].resource.{path}"), message)
        }
        other => other,
    }
}
