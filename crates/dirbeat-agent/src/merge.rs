//! Service Record Merging
//!
//! A refresh must not blindly overwrite the DIR-side record: DIR and
//! operators own the `static.*` attributes, and a volume record accumulates
//! one `mrc`/`mrcN` key per MRC replica while each MRC's generator only
//! knows its own UUID. [`merge_service_record`] combines the generator's
//! fresh data with the prior record accordingly.
//!
//! Insertion order of the merged data is: preserved static attributes,
//! preserved replica keys, the newly appended replica key (if any), then
//! the generator's remaining data.

use tracing::debug;

use dirbeat_common::protocol::error::{DirError, Result};
use dirbeat_common::protocol::{
    Service, ServiceDataMap, ServiceStatus, ServiceType, STATIC_ATTR_PREFIX, STATUS_ATTR,
};

/// Key prefix shared by all MRC replica attributes of a volume record.
const MRC_KEY_PREFIX: &str = "mrc";

/// Merges a fresh registration against the prior DIR record.
///
/// The returned record echoes the prior record's version (0 when there is
/// none), so writing it implements DIR's optimistic concurrency: a
/// conflicting write is rejected and the next refresh retries against the
/// then-current record.
///
/// A registration of type `VOLUME` must carry an `mrc` key naming the MRC
/// it was generated on; its absence is a generator bug and yields
/// [`DirError::InvalidRegistration`].
pub fn merge_service_record(reg: &Service, prior: Option<&Service>) -> Result<Service> {
    let current_version = prior.map(|p| p.version).unwrap_or(0);

    let mut data = ServiceDataMap::new();

    // DIR-owned static attributes survive the refresh unless the generator
    // overrides them.
    if let Some(prior) = prior {
        for entry in prior.data.iter() {
            if entry.key.starts_with(STATIC_ATTR_PREFIX) {
                data.insert(entry.key.clone(), entry.value.clone());
            }
        }
    }
    if !data.contains_key(STATUS_ATTR) {
        data.insert(STATUS_ATTR, ServiceStatus::Avail.ordinal().to_string());
    }

    let replica_merge = reg.kind == ServiceType::Volume
        && prior.map_or(false, |prior| prior.uuid == reg.uuid);

    if replica_merge {
        let prior = prior.expect("replica_merge implies a prior record");
        merge_volume_replicas(reg, prior, &mut data)?;
    } else {
        for entry in reg.data.iter() {
            data.insert(entry.key.clone(), entry.value.clone());
        }
    }

    let mut merged = reg.clone();
    merged.version = current_version;
    merged.data = data;
    Ok(merged)
}

/// Replica-aware merge for volume records: all prior `mrc*` keys are kept,
/// the registering MRC is appended under the next vacant `mrcN` key if its
/// UUID is not among them, and the generator's non-replica data replaces
/// the rest.
fn merge_volume_replicas(reg: &Service, prior: &Service, data: &mut ServiceDataMap) -> Result<()> {
    // A generator that registers a volume without naming its MRC is broken;
    // the caller treats this as fatal rather than writing a record that can
    // never be replica-merged again.
    let mrc_uuid = reg.data.get(MRC_KEY_PREFIX).ok_or_else(|| {
        DirError::InvalidRegistration(format!(
            "volume record {} carries no mrc key",
            reg.uuid
        ))
    })?;

    let mut contained = false;
    let mut max_replica_no: u32 = 1; // the bare "mrc" key counts as replica 1
    for entry in prior.data.iter() {
        if !entry.key.starts_with(MRC_KEY_PREFIX) {
            continue;
        }

        data.insert(entry.key.clone(), entry.value.clone());

        if entry.value == mrc_uuid {
            contained = true;
        }

        if entry.key != MRC_KEY_PREFIX {
            match entry.key[MRC_KEY_PREFIX.len()..].parse::<u32>() {
                Ok(no) if no > max_replica_no => max_replica_no = no,
                Ok(_) => {}
                Err(_) => {
                    debug!(key = %entry.key, "replica key with non-numeric suffix, not counted");
                }
            }
        }
    }

    if !contained {
        data.insert(
            format!("{}{}", MRC_KEY_PREFIX, max_replica_no + 1),
            mrc_uuid.to_owned(),
        );
    }

    for entry in reg.data.iter() {
        if !entry.key.starts_with(MRC_KEY_PREFIX) {
            data.insert(entry.key.clone(), entry.value.clone());
        } else if entry.key != MRC_KEY_PREFIX {
            // Generators only know their own MRC; numbered keys from a
            // generator are dropped in favor of the prior record's.
            debug!(uuid = %reg.uuid, key = %entry.key, "dropping generator-supplied replica key");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirbeat_common::protocol::ServiceId;

    fn volume(data: &[(&str, &str)]) -> Service {
        service(ServiceType::Volume, data)
    }

    fn service(kind: ServiceType, data: &[(&str, &str)]) -> Service {
        let mut record = Service::new(ServiceId::from("Vol1"), kind, "service under test");
        for (k, v) in data {
            record.data.insert(*k, *v);
        }
        record
    }

    fn prior_with(version: u64, data: &[(&str, &str)]) -> Service {
        let mut record = service(ServiceType::Volume, data);
        record.version = version;
        record
    }

    fn entries(record: &Service) -> Vec<(&str, &str)> {
        record
            .data
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect()
    }

    #[test]
    fn test_first_registration_has_version_zero_and_status() {
        let reg = service(ServiceType::Osd, &[("free_bytes", "1000")]);
        let merged = merge_service_record(&reg, None).unwrap();

        assert_eq!(merged.version, 0);
        assert_eq!(merged.data.get("static.status"), Some("0"));
        assert_eq!(merged.data.get("free_bytes"), Some("1000"));
    }

    #[test]
    fn test_version_echoes_prior() {
        let reg = service(ServiceType::Osd, &[]);
        let prior = prior_with(7, &[]);
        let merged = merge_service_record(&reg, Some(&prior)).unwrap();
        assert_eq!(merged.version, 7);
    }

    #[test]
    fn test_static_attributes_are_preserved() {
        // Scenario: prior record carries operator-set static attributes the
        // generator knows nothing about.
        let reg = service(ServiceType::Osd, &[("free_bytes", "1000")]);
        let prior = prior_with(
            7,
            &[("static.status", "0"), ("static.load", "0.3")],
        );

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        assert_eq!(merged.version, 7);
        assert_eq!(
            entries(&merged),
            vec![
                ("static.status", "0"),
                ("static.load", "0.3"),
                ("free_bytes", "1000"),
            ]
        );
    }

    #[test]
    fn test_non_static_prior_keys_are_replaced() {
        let reg = service(ServiceType::Osd, &[("free_bytes", "500")]);
        let prior = prior_with(2, &[("free_bytes", "1000"), ("total_bytes", "2000")]);

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        assert_eq!(merged.data.get("free_bytes"), Some("500"));
        // Keys the generator stopped reporting disappear.
        assert_eq!(merged.data.get("total_bytes"), None);
    }

    #[test]
    fn test_volume_new_replica_is_appended() {
        let reg = volume(&[("mrc", "M2"), ("uuid", "Vol1")]);
        let prior = prior_with(1, &[("mrc", "M1"), ("static.status", "0")]);

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        assert_eq!(
            entries(&merged),
            vec![
                ("static.status", "0"),
                ("mrc", "M1"),
                ("mrc2", "M2"),
                ("uuid", "Vol1"),
            ]
        );
    }

    #[test]
    fn test_volume_known_replica_is_not_duplicated() {
        let reg = volume(&[("mrc", "M1")]);
        let prior = prior_with(1, &[("mrc", "M1"), ("mrc2", "M2")]);

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        let mrc_values: Vec<_> = merged
            .data
            .iter()
            .filter(|e| e.key.starts_with("mrc"))
            .map(|e| e.value.as_str())
            .collect();
        assert_eq!(mrc_values, vec!["M1", "M2"]);
        assert!(!merged.data.contains_key("mrc3"));
    }

    #[test]
    fn test_volume_replica_numbering_skips_to_max_plus_one() {
        let reg = volume(&[("mrc", "M9")]);
        let prior = prior_with(3, &[("mrc", "M1"), ("mrc5", "M5")]);

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        assert_eq!(merged.data.get("mrc6"), Some("M9"));
        assert_eq!(merged.data.get("mrc"), Some("M1"));
        assert_eq!(merged.data.get("mrc5"), Some("M5"));
    }

    #[test]
    fn test_volume_merge_is_idempotent() {
        let reg = volume(&[("mrc", "M2"), ("free_bytes", "1000")]);
        let prior = prior_with(4, &[("mrc", "M1"), ("static.status", "0")]);

        let first = merge_service_record(&reg, Some(&prior)).unwrap();

        // Simulate DIR storing the write and assigning the next version.
        let mut stored = first.clone();
        stored.version += 1;

        let second = merge_service_record(&reg, Some(&stored)).unwrap();

        let replica_values = |record: &Service| -> Vec<String> {
            record
                .data
                .iter()
                .filter(|e| e.key.starts_with("mrc"))
                .map(|e| e.value.clone())
                .collect()
        };
        assert_eq!(replica_values(&first), replica_values(&second));
        assert_eq!(second.version, stored.version);
    }

    #[test]
    fn test_volume_generator_numbered_replica_keys_are_dropped() {
        // A generator must only report its own MRC under the bare key; a
        // numbered key conflicting with the prior record loses.
        let reg = volume(&[("mrc", "M1"), ("mrc2", "MX")]);
        let prior = prior_with(1, &[("mrc", "M1"), ("mrc2", "M2")]);

        let merged = merge_service_record(&reg, Some(&prior)).unwrap();

        assert_eq!(merged.data.get("mrc2"), Some("M2"));
    }

    #[test]
    fn test_volume_without_prior_passes_data_through() {
        let reg = volume(&[("mrc", "M1"), ("free_bytes", "1000")]);
        let merged = merge_service_record(&reg, None).unwrap();

        assert_eq!(merged.version, 0);
        assert_eq!(merged.data.get("mrc"), Some("M1"));
        assert_eq!(merged.data.get("free_bytes"), Some("1000"));
    }

    #[test]
    fn test_volume_without_mrc_key_is_rejected() {
        let reg = volume(&[("free_bytes", "1000")]);
        let prior = prior_with(1, &[("mrc", "M1")]);

        match merge_service_record(&reg, Some(&prior)) {
            Err(DirError::InvalidRegistration(msg)) => assert!(msg.contains("Vol1")),
            other => panic!("expected InvalidRegistration, got {:?}", other),
        }
    }

    #[test]
    fn test_status_survives_generator_omission_across_cycles() {
        let reg = service(ServiceType::Osd, &[("free_bytes", "1000")]);

        let first = merge_service_record(&reg, None).unwrap();
        assert_eq!(first.data.get("static.status"), Some("0"));

        let mut stored = first;
        stored.version = 1;
        let second = merge_service_record(&reg, Some(&stored)).unwrap();
        assert_eq!(second.data.get("static.status"), Some("0"));
    }
}
