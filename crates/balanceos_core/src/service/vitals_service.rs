//! Vitals use-cases: per-day read with carry-over, upsert with derived
//! energy values, history.
//!
//! # Invariants
//! - Reading a day without an entry never writes.
//! - Sleep duration, BMR and NEAT are recomputed on every accepted upsert.
//! - A stored `manual_override` entry ignores input that does not itself
//!   carry the override flag.

use crate::energy::{best_bmr, neat_from_bmr, sleep_duration_hours, BodyMetrics};
use crate::model::vitals::{EntrySource, VitalEntry, VitalInput};
use crate::repo::{ProfileRepository, VitalsRepository};
use crate::service::ServiceResult;
use chrono::NaiveDate;
use log::debug;

/// Upper bound for history requests.
pub const MAX_HISTORY_DAYS: u32 = 366;

pub struct VitalsService<V: VitalsRepository, P: ProfileRepository> {
    vitals: V,
    profiles: P,
}

impl<V: VitalsRepository, P: ProfileRepository> VitalsService<V, P> {
    pub fn new(vitals: V, profiles: P) -> Self {
        Self { vitals, profiles }
    }

    /// Stored entry of `date`; otherwise weight and body fat carried over
    /// from the latest earlier entry; otherwise an empty entry.
    pub fn get_vitals(&self, date: NaiveDate) -> ServiceResult<VitalEntry> {
        if let Some(entry) = self.vitals.get_by_date(date)? {
            return Ok(entry);
        }
        Ok(match self.vitals.latest_before(date)? {
            Some(previous) => VitalEntry::carried_over(date, &previous),
            None => VitalEntry::empty(date),
        })
    }

    /// Merges `input` into the entry of its date and stores the result.
    ///
    /// # Contract
    /// - Returns the stored entry unchanged when it has `manual_override`
    ///   and `input.manual_override` is false.
    /// - BMR uses the entry's weight, or the latest earlier weight when the
    ///   day has none; it stays empty when the profile lacks the inputs.
    pub fn upsert_vitals(&self, input: VitalInput) -> ServiceResult<VitalEntry> {
        input.validate()?;
        let existing = self.vitals.get_by_date(input.date)?;
        if let Some(existing) = &existing {
            if existing.manual_override && !input.manual_override {
                debug!(
                    "event=vitals_upsert module=service status=skipped reason=manual_override date={}",
                    existing.date
                );
                return Ok(existing.clone());
            }
        }

        let mut entry = existing.unwrap_or_else(|| VitalEntry::empty(input.date));
        input.merge_into(&mut entry);
        entry.manual_override = input.manual_override;
        entry.source = EntrySource::Manual;
        self.derive_energy(&mut entry)?;
        Ok(self.vitals.upsert(&entry)?)
    }

    /// Up to `days` entries, newest first.
    pub fn history(&self, days: u32) -> ServiceResult<Vec<VitalEntry>> {
        Ok(self.vitals.list_recent(days.clamp(1, MAX_HISTORY_DAYS))?)
    }

    /// Chronological entries within `start..=end`.
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> ServiceResult<Vec<VitalEntry>> {
        Ok(self.vitals.list_range(start, end)?)
    }

    pub(crate) fn derive_energy(&self, entry: &mut VitalEntry) -> ServiceResult<()> {
        entry.sleep_duration = match (entry.sleep_start, entry.sleep_end) {
            (Some(start), Some(end)) => Some(sleep_duration_hours(start, end)),
            _ => entry.sleep_duration,
        };

        let (weight, body_fat) = match entry.weight {
            Some(weight) => (Some(weight), entry.body_fat),
            None => match self.vitals.latest_before(entry.date)? {
                Some(previous) => (previous.weight, previous.body_fat),
                None => (None, None),
            },
        };
        let profile = self.profiles.load_profile()?;
        let metrics = BodyMetrics {
            weight,
            body_fat,
            height: profile.height,
            birth_date: profile.birth_date,
            gender: profile.gender,
        };
        match best_bmr(&metrics, entry.date) {
            Ok(estimate) => {
                entry.basal_metabolic_rate = Some(estimate.kcal);
                entry.neat = Some(neat_from_bmr(estimate.kcal));
            }
            Err(unavailable) => {
                debug!(
                    "event=bmr_derive module=service status=skipped date={} reason=\"{}\"",
                    entry.date, unavailable
                );
                entry.basal_metabolic_rate = None;
                entry.neat = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::VitalsService;
    use crate::db::open_db_in_memory;
    use crate::model::profile::{Gender, ProfileUpdate};
    use crate::model::vitals::{EntrySource, VitalInput};
    use crate::repo::{ProfileRepository, SqliteProfileRepository, SqliteVitalsRepository};
    use chrono::{NaiveDate, NaiveTime};
    use rusqlite::Connection;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn service(conn: &Connection) -> VitalsService<SqliteVitalsRepository<'_>, SqliteProfileRepository<'_>> {
        VitalsService::new(
            SqliteVitalsRepository::new(conn),
            SqliteProfileRepository::new(conn),
        )
    }

    fn set_profile(conn: &Connection) {
        let repo = SqliteProfileRepository::new(conn);
        let mut profile = repo.load_profile().unwrap();
        ProfileUpdate {
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1),
            height: Some(180.0),
            gender: Some(Gender::Male),
            ..ProfileUpdate::default()
        }
        .apply_to(&mut profile);
        repo.save_profile(&profile).unwrap();
    }

    #[test]
    fn missing_day_carries_over_body_composition() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let mut input = VitalInput::new(day(1));
        input.weight = Some(80.0);
        input.body_fat = Some(20.0);
        input.sleep_quality = Some(7);
        service.upsert_vitals(input).unwrap();

        let carried = service.get_vitals(day(4)).unwrap();
        assert_eq!(carried.source, EntrySource::CarriedOver);
        assert_eq!(carried.weight, Some(80.0));
        assert_eq!(carried.body_fat, Some(20.0));
        assert_eq!(carried.sleep_quality, None);
        assert!(!carried.is_stored());

        let before = service.get_vitals(NaiveDate::from_ymd_opt(2025, 4, 30).unwrap()).unwrap();
        assert_eq!(before.source, EntrySource::Manual);
        assert_eq!(before.weight, None);
    }

    #[test]
    fn upsert_derives_sleep_bmr_and_neat() {
        let conn = open_db_in_memory().unwrap();
        set_profile(&conn);
        let service = service(&conn);

        let mut input = VitalInput::new(day(10));
        input.weight = Some(80.0);
        input.sleep_start = NaiveTime::from_hms_opt(23, 30, 0);
        input.sleep_end = NaiveTime::from_hms_opt(7, 0, 0);
        let entry = service.upsert_vitals(input).unwrap();

        assert_eq!(entry.sleep_duration, Some(7.5));
        // 10*80 + 6.25*180 - 5*35 + 5
        assert_eq!(entry.basal_metabolic_rate, Some(1755));
        assert_eq!(entry.neat, Some(658));
        assert!(entry.manual_override);
    }

    #[test]
    fn body_fat_switches_to_katch_mcardle() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);

        let mut input = VitalInput::new(day(10));
        input.weight = Some(80.0);
        input.body_fat = Some(20.0);
        let entry = service.upsert_vitals(input).unwrap();
        // 370 + 21.6 * 64
        assert_eq!(entry.basal_metabolic_rate, Some(1752));
    }

    #[test]
    fn manual_override_blocks_non_override_input() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        let mut input = VitalInput::new(day(3));
        input.weight = Some(75.0);
        service.upsert_vitals(input).unwrap();

        let mut sync_like = VitalInput::new(day(3));
        sync_like.weight = Some(90.0);
        sync_like.manual_override = false;
        let entry = service.upsert_vitals(sync_like).unwrap();
        assert_eq!(entry.weight, Some(75.0));

        let mut override_input = VitalInput::new(day(3));
        override_input.weight = Some(74.0);
        let entry = service.upsert_vitals(override_input).unwrap();
        assert_eq!(entry.weight, Some(74.0));
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn);
        for d in 1..=4 {
            let mut input = VitalInput::new(day(d));
            input.weight = Some(70.0 + f64::from(d));
            service.upsert_vitals(input).unwrap();
        }

        let history = service.history(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, day(4));
        assert_eq!(history[1].date, day(3));
        assert_eq!(service.history(0).unwrap().len(), 1);
    }
}
