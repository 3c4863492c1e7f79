//! Root-CA generator CLI.
//!
//! Writes a self-signed root certificate and its RSA private key in PEM
//! form. Clients must install the certificate into their trust store for
//! the proxy's minted leaves to be accepted.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fingernet::base::{ProxyError, Result};
use fingernet::cert::{CertAuthority, RootOptions};

#[derive(Parser, Debug)]
#[command(name = "generate-ca", version, about = "Generate the MITM root CA")]
struct Args {
    /// Output certificate path
    #[arg(long, default_value = "ca.crt")]
    cert: PathBuf,

    /// Output private key path
    #[arg(long, default_value = "ca.key")]
    key: PathBuf,

    /// Certificate organization
    #[arg(long, default_value = "MITM Proxy CA")]
    org: String,

    /// Certificate country code
    #[arg(long, default_value = "CN")]
    country: String,

    /// Certificate common name
    #[arg(long, default_value = "MITM Proxy CA")]
    name: String,

    /// Validity in years
    #[arg(long, default_value_t = 10)]
    years: u32,
}

fn write_key(path: &PathBuf, pem: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(pem)
}

fn run(args: Args) -> Result<()> {
    let options = RootOptions {
        organization: args.org,
        country: args.country,
        common_name: args.name,
        valid_years: args.years,
    };

    let (cert_pem, key_pem) = CertAuthority::generate_root(&options)?;

    std::fs::write(&args.cert, &cert_pem).map_err(|e| {
        ProxyError::certificate(format!("failed to write {}", args.cert.display())).with_source(e)
    })?;
    write_key(&args.key, &key_pem).map_err(|e| {
        ProxyError::certificate(format!("failed to write {}", args.key.display())).with_source(e)
    })?;

    println!("CA certificate written to {}", args.cert.display());
    println!("CA private key written to {}", args.key.display());
    println!("Install the certificate into your OS/browser trust store.");
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("generate-ca: {e}");
            ExitCode::FAILURE
        }
    }
}
