use anyhow::{Result, bail};
use srn_application::ErrorResponse;
use srn_core::migration::StorageKind;
use srn_core::scope::Scope;
use srn_core::srn;
use srn_infrastructure::{FsTreeAdapter, SrnConfig};

use super::print_json;

pub fn parse(raw: &str) -> Result<()> {
    match Scope::from_string(raw) {
        Ok(scope) => print_json(&srn_application::ParsedSrn::from(&scope)),
        Err(e) => report(ErrorResponse::from(e)),
    }
}

pub fn validate(raw: &str) -> Result<()> {
    match srn::validate(raw) {
        Ok(()) => {
            println!("valid: {}", srn::canonicalize(raw));
            Ok(())
        }
        Err(e) => report(ErrorResponse::from(e)),
    }
}

pub fn address(raw: &str) -> Result<()> {
    let scope = match Scope::from_string(raw) {
        Ok(scope) => scope,
        Err(e) => return report(ErrorResponse::from(e)),
    };
    for address in srn_core::ScopeAddress::derive_all(&scope)? {
        println!("{:<18} {}", address.family(), address.render());
    }
    Ok(())
}

/// Lists scopes with migrated data, scanning every hierarchical store kind.
pub async fn scopes(config: &SrnConfig, pattern: Option<&str>) -> Result<()> {
    let working_dir = config.working_dir()?;
    let mut found = Vec::new();
    for kind in [StorageKind::VectorStore, StorageKind::GraphStore] {
        let adapter = FsTreeAdapter::new(working_dir.clone(), kind);
        found.extend(adapter.list_scopes(pattern).await?);
    }
    found.sort();
    found.dedup();

    if found.is_empty() {
        println!("No scopes found in {}", working_dir.display());
    }
    for scope in found {
        println!("{}", scope);
    }
    Ok(())
}

fn report(error: ErrorResponse) -> Result<()> {
    print_json(&error)?;
    bail!("{}", error)
}
