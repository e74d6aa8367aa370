use crate::wiring::ProcessContext;

pub fn show(context: &ProcessContext, json: bool) -> anyhow::Result<()> {
    let capabilities = context.capabilities();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "platform": std::env::consts::OS,
                "capabilities": capabilities,
                "next_refresh": context.scheduler.next_due(),
                "last_refresh": context.scheduler.last_refresh(),
            }))?
        );
        return Ok(());
    }

    println!("tether {}", env!("CARGO_PKG_VERSION"));
    for capability in capabilities {
        let marker = if capability.healthy { "ok" } else { "!!" };
        println!("  [{marker}] {:<8} {}", capability.name, capability.summary);
    }
    match context.scheduler.next_due() {
        Some(due) => println!("  next refresh: {due}"),
        None => println!("  next refresh: not scheduled"),
    }
    Ok(())
}
