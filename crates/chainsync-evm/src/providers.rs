//! Hosted RPC provider endpoints.

use crate::rpc::RpcError;

/// Infura HTTPS endpoint for `chain_id`.
///
/// Fails for an empty project id or a chain Infura does not serve.
pub fn infura_url(project_id: &str, chain_id: u64) -> Result<String, RpcError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(RpcError::Malformed("Infura project id is empty".into()));
    }
    let network = infura_network(chain_id)
        .ok_or_else(|| RpcError::Malformed(format!("Infura does not serve chain id {chain_id}")))?;
    Ok(format!("https://{network}.infura.io/v3/{project_id}"))
}

fn infura_network(chain_id: u64) -> Option<&'static str> {
    Some(match chain_id {
        1 => "mainnet",
        11155111 => "sepolia",
        17000 => "holesky",
        137 => "polygon-mainnet",
        80002 => "polygon-amoy",
        42161 => "arbitrum-mainnet",
        10 => "optimism-mainnet",
        8453 => "base-mainnet",
        59144 => "linea-mainnet",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infura_mainnet_url() {
        assert_eq!(
            infura_url("proj123", 1).unwrap(),
            "https://mainnet.infura.io/v3/proj123"
        );
    }

    #[test]
    fn infura_l2_url() {
        assert_eq!(
            infura_url("p", 42161).unwrap(),
            "https://arbitrum-mainnet.infura.io/v3/p"
        );
    }

    #[test]
    fn rejects_missing_project_or_unknown_chain() {
        assert!(infura_url("  ", 1).is_err());
        assert!(infura_url("proj", 999_999).is_err());
    }
}
