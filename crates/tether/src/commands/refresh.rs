use tether_signing::RefreshOutcome;

use crate::commands::exit_with;
use crate::wiring::ProcessContext;

pub async fn run(context: &ProcessContext) -> anyhow::Result<()> {
    match context.scheduler.run_cycle().await {
        Ok(RefreshOutcome::Completed) => println!("certificate renewed"),
        Ok(RefreshOutcome::NotDue) => println!("certificate still has margin, nothing to do"),
        Ok(RefreshOutcome::NotAuthenticated) => println!("not signed in, refresh skipped"),
        Err(e) => exit_with(e),
    }
    Ok(())
}

pub fn show(context: &ProcessContext, json: bool) -> anyhow::Result<()> {
    let next = context.scheduler.next_due();
    let last = context.scheduler.last_refresh();
    let expires = context.certificates.expires_at();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "certificate_expires_at": expires,
                "last_refresh": last,
                "next_refresh": next,
                "due": context.certificates.needs_refresh(),
            })
        );
        return Ok(());
    }

    match expires {
        Some(at) => println!("certificate expires: {at}"),
        None => println!("certificate expires: never issued"),
    }
    match last {
        Some(at) => println!("last refresh:        {at}"),
        None => println!("last refresh:        never"),
    }
    match next {
        Some(at) => println!("next refresh:        {at}"),
        None => println!("next refresh:        not scheduled"),
    }
    Ok(())
}
