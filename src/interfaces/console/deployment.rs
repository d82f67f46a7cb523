use super::{CONTRACT_NAME, RULE};
use crate::domain::ports::LedgerMeta;
use std::io::{self, Write};

/// Prints the report shown after a successful deployment.
pub fn write_deployment_report<W: Write>(
    writer: &mut W,
    meta: &LedgerMeta,
    address: &str,
) -> io::Result<()> {
    writeln!(writer, "Deployment successful!")?;
    writeln!(writer, "Contract: {}", CONTRACT_NAME)?;
    writeln!(writer, "Address: {}", address)?;
    writeln!(writer, "Deployed by: {}", meta.deployer)?;
    writeln!(writer, "Owner: {}", meta.owner)?;
    writeln!(writer, "Network: {}", meta.network)?;
    writer.flush()
}

/// Prints the banner shown before streaming the event log.
pub fn write_log_banner<W: Write>(
    writer: &mut W,
    meta: &LedgerMeta,
    address: &str,
) -> io::Result<()> {
    writeln!(writer, "Listening for {} events...", CONTRACT_NAME)?;
    writeln!(writer, "Contract Address: {}", address)?;
    writeln!(writer, "Network: {}", meta.network)?;
    writeln!(writer, "{}", RULE)?;
    writer.flush()
}
