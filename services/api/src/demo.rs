use crate::infra::{
    default_matching_config, seed_demo_fixtures, InMemoryMatchingStore, InMemoryProviderDirectory,
    LoggingDispatcher, LoggingPaymentAdjuster,
};
use clap::Args;
use std::sync::Arc;
use sweeply::config::AppConfig;
use sweeply::error::AppError;
use sweeply::matching::{BookingCriteria, MatchingService, MatchingStore};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of providers the demo booking needs
    #[arg(long, default_value_t = 1)]
    pub(crate) required_providers: u8,
    /// Prefer eco-certified providers in scoring
    #[arg(long)]
    pub(crate) eco: bool,
    /// Number of invitations to issue
    #[arg(long, default_value_t = 3)]
    pub(crate) fanout: usize,
    /// Have the runner-up decline before the team fills
    #[arg(long)]
    pub(crate) with_decline: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let store = Arc::new(InMemoryMatchingStore::default());
    let providers = Arc::new(InMemoryProviderDirectory::default());
    let booking_id = seed_demo_fixtures(&store, &providers, args.required_providers, args.eco);
    let service = MatchingService::new(
        store.clone(),
        providers,
        Arc::new(LoggingDispatcher::default()),
        Arc::new(LoggingPaymentAdjuster),
        default_matching_config(&config.matching),
    );

    println!("Sweeply matching demo");
    println!(
        "Booking {} needs {} provider(s){}",
        booking_id.0,
        args.required_providers,
        if args.eco { ", eco preferred" } else { "" }
    );

    let booking = store
        .fetch_booking(&booking_id)
        .map_err(sweeply::matching::MatchingServiceError::from)?
        .expect("demo booking was seeded");
    let criteria = BookingCriteria::from_booking(&booking);

    println!("\nRanked market");
    let ranked = service.score_candidates(&criteria, 10)?;
    if ranked.is_empty() {
        println!("  no eligible providers");
        return Ok(());
    }
    for candidate in &ranked {
        println!(
            "  #{} {} score {:.3}",
            candidate.rank, candidate.provider_id.0, candidate.score
        );
        for component in &candidate.components {
            println!(
                "      {:<20} raw {:.2} weighted {:.3}  {}",
                component.factor.label(),
                component.raw,
                component.weighted,
                component.notes
            );
        }
    }

    println!("\nIssuing up to {} invitations", args.fanout);
    let invitations = service.issue_invitations(&booking_id, args.fanout)?;
    for invitation in &invitations {
        println!(
            "  {} -> {} ({})",
            invitation.id.0,
            invitation.provider_id.0,
            invitation.status.label()
        );
    }

    let mut remaining = invitations.iter();
    if args.with_decline {
        if let Some(decliner) = invitations.get(1) {
            let ack = service.decline_invitation(&decliner.id, &decliner.provider_id)?;
            println!(
                "\n{} declined at {}",
                ack.provider_id.0,
                ack.responded_at.format("%H:%M:%S")
            );
        }
    }

    println!("\nAccepting in ranked order until the team fills");
    let mut filled = false;
    while !filled {
        let Some(invitation) = remaining.next() else {
            break;
        };
        if args.with_decline && invitations.get(1).map(|i| &i.id) == Some(&invitation.id) {
            continue;
        }
        match service.accept_invitation(&invitation.id, &invitation.provider_id) {
            Ok(outcome) => {
                println!(
                    "  {} accepted ({}/{}), booking now {}",
                    outcome.assignment.provider_id.0,
                    outcome.assigned_count,
                    outcome.booking.required_providers,
                    outcome.booking.status.label()
                );
                if !outcome.expired_invitations.is_empty() {
                    let expired: Vec<&str> = outcome
                        .expired_invitations
                        .iter()
                        .map(|id| id.0.as_str())
                        .collect();
                    println!("  cascade expired: {}", expired.join(", "));
                }
                if outcome.assigned_count == outcome.booking.required_providers as usize {
                    println!(
                        "\nPricing: labor {}c + fee {}c = {}c",
                        outcome.totals.labor_cents,
                        outcome.totals.fee_cents,
                        outcome.totals.total_cents
                    );
                    filled = true;
                }
            }
            Err(err) => println!("  {} could not accept: {err}", invitation.provider_id.0),
        }
    }

    let committed = store
        .fetch_booking(&booking_id)
        .map_err(sweeply::matching::MatchingServiceError::from)?
        .expect("demo booking still present");
    println!("\nAudit trail");
    for entry in &committed.audit_log {
        println!(
            "  {} {} by {}",
            entry.recorded_at.format("%H:%M:%S"),
            entry.action.label(),
            entry.actor
        );
    }

    Ok(())
}
