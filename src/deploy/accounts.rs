use super::AccountResolutionError;
use crate::types::{AccountRef, NetworkProfile};
use std::collections::BTreeMap;

/// `0x` followed by exactly 40 hex digits.
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Binds one role to a concrete address. Indices refer into `key_set`, the
/// signer addresses the network client exposes.
pub fn resolve_role(
    network: &NetworkProfile,
    role: &str,
    key_set: &[String],
) -> Result<String, AccountResolutionError> {
    let binding = network
        .accounts
        .get(role)
        .ok_or_else(|| AccountResolutionError::UnknownRole {
            network_id: network.id.clone(),
            role: role.to_string(),
        })?;

    let address = match binding {
        AccountRef::Address(address) => address.clone(),
        AccountRef::Index(index) => key_set.get(*index).cloned().ok_or_else(|| {
            AccountResolutionError::IndexOutOfRange {
                network_id: network.id.clone(),
                role: role.to_string(),
                index: *index,
                available: key_set.len(),
            }
        })?,
    };

    if !is_valid_address(&address) {
        return Err(AccountResolutionError::MalformedAddress {
            network_id: network.id.clone(),
            role: role.to_string(),
            address,
        });
    }
    Ok(address)
}

/// Resolves every role bound on the network.
pub fn resolve_accounts(
    network: &NetworkProfile,
    key_set: &[String],
) -> Result<BTreeMap<String, String>, AccountResolutionError> {
    network
        .accounts
        .keys()
        .map(|role| Ok((role.clone(), resolve_role(network, role, key_set)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GasSetting;
    use url::Url;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    fn network(accounts: &[(&str, AccountRef)]) -> NetworkProfile {
        NetworkProfile {
            id: "sepolia".to_string(),
            endpoint: Url::parse("http://localhost:8545").unwrap(),
            accounts: accounts
                .iter()
                .map(|(role, binding)| (role.to_string(), binding.clone()))
                .collect(),
            verification: None,
            live: true,
            save_deployments: true,
            gas: GasSetting::Auto,
        }
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(ALICE));
        assert!(is_valid_address("0xABCDEFabcdef0123456789abcdef0123456789AB"));
        assert!(!is_valid_address("1111111111111111111111111111111111111111"));
        assert!(!is_valid_address("0x111"));
        assert!(!is_valid_address("0x111111111111111111111111111111111111111g"));
    }

    #[test]
    fn test_index_and_address_bindings() {
        let network = network(&[
            ("deployer", AccountRef::Index(1)),
            ("treasury", AccountRef::Address(ALICE.to_string())),
        ]);
        let key_set = vec![ALICE.to_string(), BOB.to_string()];

        let accounts = resolve_accounts(&network, &key_set).unwrap();
        assert_eq!(accounts["deployer"], BOB);
        assert_eq!(accounts["treasury"], ALICE);
    }

    #[test]
    fn test_index_out_of_range() {
        let network = network(&[("deployer", AccountRef::Index(2))]);
        let err = resolve_role(&network, "deployer", &[ALICE.to_string()]).unwrap_err();
        assert_eq!(
            err,
            AccountResolutionError::IndexOutOfRange {
                network_id: "sepolia".to_string(),
                role: "deployer".to_string(),
                index: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn test_malformed_and_unknown() {
        let network = network(&[("deployer", AccountRef::Address("0xnothex".to_string()))]);
        assert!(matches!(
            resolve_role(&network, "deployer", &[]),
            Err(AccountResolutionError::MalformedAddress { .. })
        ));
        assert!(matches!(
            resolve_role(&network, "admin", &[]),
            Err(AccountResolutionError::UnknownRole { .. })
        ));
    }
}
