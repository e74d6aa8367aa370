use crate::cli::TunnelSubcommand;
use crate::commands::exit_with;
use crate::wiring::ProcessContext;

pub fn dispatch(context: &ProcessContext, command: &TunnelSubcommand) -> anyhow::Result<()> {
    match command {
        TunnelSubcommand::Start => match context.tunnel.start() {
            Ok(()) => {
                println!("tunnel relaying on {}", context.tunnel.bind_address());
                Ok(())
            }
            Err(e) => exit_with(e),
        },
        TunnelSubcommand::Stop => {
            context.tunnel.stop();
            println!("tunnel stopped");
            Ok(())
        }
        TunnelSubcommand::Test => {
            if context.tunnel.test() {
                println!("tunnel connectivity ok");
                Ok(())
            } else {
                exit_with(tether_tunnel::TunnelError::TestFailed(
                    context.config.tunnel.test_timeout_ms,
                ))
            }
        }
    }
}
