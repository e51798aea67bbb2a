use crate::output;

use color_eyre::Result;
use hyperion_engine::Capabilities;

/// Print which interpreters and tools this machine provides
pub async fn execute() -> Result<()> {
    output::status("Probing", "local capabilities");
    let capabilities = Capabilities::detect().await;
    for line in capabilities.lines() {
        println!("  {}", line);
    }
    Ok(())
}
