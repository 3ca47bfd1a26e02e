//! Implementation of the `subnet-agent config` command.

use crate::cli::ConfigArgs;
use subnet_agent::config::AgentConfig;
use subnet_agent::error::Result;

/// Print the effective configuration as YAML. The private key is always
/// redacted. With `--check`, also validate it.
pub fn cmd_config(config: &AgentConfig, args: ConfigArgs) -> Result<()> {
    print!("{}", render(config)?);

    if args.check {
        let resolved = config.resolve()?;
        println!();
        println!("Configuration OK");
        println!("  matcher:    {}", resolved.identity.matcher_url);
        println!("  validator:  {}", resolved.identity.validator_url);
        println!("  public key: {}", resolved.signing.public_key_hex());
    }
    Ok(())
}

fn render(config: &AgentConfig) -> Result<String> {
    config.to_yaml()
}
