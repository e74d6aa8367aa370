pub mod account;
pub mod device;
pub mod refresh;
pub mod run;
pub mod sign;
pub mod status;
pub mod tunnel;

use tether_common::error::ErrorCode;

/// Print a typed domain error and exit with its stable code.
pub(crate) fn exit_with<E>(err: E) -> !
where
    E: std::fmt::Display,
    for<'a> &'a E: Into<ErrorCode>,
{
    let code: ErrorCode = (&err).into();
    eprintln!("error: {err}");
    std::process::exit(code.exit_code());
}
