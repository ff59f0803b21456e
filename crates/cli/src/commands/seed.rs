use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, Failure, EXIT_MIGRATION,
    EXIT_SEED_VERIFICATION,
};
use tenderdesk_db::{SeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED_VERIFICATION))?;

        let outcome: Result<SeedResult, Failure> = if verification.all_present {
            Ok(seeded)
        } else {
            Err(("seed_verification", verification_message(&verification.checks), EXIT_SEED_VERIFICATION))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn summary(seeded: &SeedResult) -> String {
    let mut lines = vec![format!(
        "demo dataset loaded: {} catalog products",
        seeded.products_seeded.len()
    )];
    lines.extend(seeded.tenders_seeded.iter().map(|id| format!("  - {id}: seeded")));
    lines.extend(
        seeded.tenders_skipped.iter().map(|id| format!("  - {id}: already present, left as is")),
    );
    lines.join("\n")
}

fn verification_message(checks: &[(String, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use tenderdesk_db::SeedResult;

    use super::{summary, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = vec![
            ("product LV-1.1-4C-95-AL present and priced".to_string(), true),
            ("product MV-11-3C-240-AL present and priced".to_string(), false),
            ("tender TND-DEMO-002 present".to_string(), false),
        ];

        assert_eq!(
            verification_message(&checks),
            "Seed verification failed for checks: product MV-11-3C-240-AL present and priced, tender TND-DEMO-002 present"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = vec![("tender TND-DEMO-001 present".to_string(), true)];
        assert_eq!(verification_message(&checks), "Some seed data failed to load");
    }

    #[test]
    fn summary_distinguishes_seeded_and_skipped_tenders() {
        let seeded = SeedResult {
            products_seeded: vec!["MV-11-3C-240-AL".to_string()],
            tenders_seeded: vec!["TND-DEMO-001".to_string()],
            tenders_skipped: vec!["TND-DEMO-002".to_string()],
        };

        assert_eq!(
            summary(&seeded),
            "demo dataset loaded: 1 catalog products\n  - TND-DEMO-001: seeded\n  - TND-DEMO-002: already present, left as is"
        );
    }
}
