//! SQLite-backed `MetadataStore`.
//!
//! Contracts and addresses live in two normalized tables so that every
//! address deploying the same bytecode shares one contract row.
//!
//! ## Feature flag
//! Only compiled when the `sqlite` feature is enabled.
//!
//! ## Schema
//! ```sql
//! CREATE TABLE ct_contracts (
//!     code_hash     TEXT PRIMARY KEY,
//!     name          TEXT NOT NULL,
//!     contract_json TEXT NOT NULL
//! );
//! CREATE TABLE ct_addresses (
//!     chain_id    TEXT    NOT NULL,
//!     address     TEXT    NOT NULL,   -- lower-case 0x hex
//!     name        TEXT    NOT NULL,
//!     is_contract INTEGER NOT NULL,
//!     code_hash   TEXT    NOT NULL,
//!     standard    TEXT,
//!     erc20_json  TEXT,
//!     PRIMARY KEY (chain_id, address)
//! );
//! ```

use alloy_primitives::{Address, B256};
use chaintrace_core::{
    address_hex,
    error::StoreError,
    provider::MetadataStore,
    semantics::{ContractMetadata, Erc20Data, StoredAddress, TokenStandard},
};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

/// Thread-safe via an internal `Arc<Mutex<Connection>>`; WAL mode is enabled
/// for concurrent readers across processes.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`, creating tables on first open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(sqlite_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(sqlite_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ct_contracts (
                code_hash     TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                contract_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ct_addresses (
                chain_id    TEXT    NOT NULL,
                address     TEXT    NOT NULL,
                name        TEXT    NOT NULL,
                is_contract INTEGER NOT NULL,
                code_hash   TEXT    NOT NULL,
                standard    TEXT,
                erc20_json  TEXT,
                PRIMARY KEY (chain_id, address)
            );
            CREATE INDEX IF NOT EXISTS ct_addresses_code_hash
                ON ct_addresses (code_hash);",
        )
        .map_err(sqlite_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (useful for tests).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

type AddressRow = (String, String, bool, String, Option<String>, Option<String>);

impl MetadataStore for SqliteStore {
    fn get_contract(&self, code_hash: &B256) -> Result<Option<ContractMetadata>, StoreError> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT contract_json FROM ct_contracts WHERE code_hash = ?1",
                params![code_hash.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_err)?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    fn put_contract(&self, contract: &ContractMetadata) -> Result<(), StoreError> {
        let json = serde_json::to_string(contract)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO ct_contracts (code_hash, name, contract_json)
                 VALUES (?1, ?2, ?3)",
                params![contract.code_hash.to_string(), &contract.name, &json],
            )
            .map_err(sqlite_err)?;
        Ok(())
    }

    fn get_address(&self, chain_id: &str, address: &Address) -> Result<Option<StoredAddress>, StoreError> {
        let row: Option<AddressRow> = self
            .conn()?
            .query_row(
                "SELECT address, name, is_contract, code_hash, standard, erc20_json
                 FROM ct_addresses WHERE chain_id = ?1 AND address = ?2",
                params![chain_id, address_hex(address)],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(sqlite_err)?;

        let Some((addr, name, is_contract, code_hash, standard, erc20_json)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredAddress {
            chain_id: chain_id.to_string(),
            address: addr.parse().map_err(|e| corrupt("address", &addr, e))?,
            name,
            is_contract,
            code_hash: code_hash.parse().map_err(|e| corrupt("code_hash", &code_hash, e))?,
            standard: standard.as_deref().map(parse_standard).transpose()?,
            erc20: erc20_json
                .map(|j| serde_json::from_str::<Erc20Data>(&j))
                .transpose()?,
        }))
    }

    fn put_address(&self, record: &StoredAddress) -> Result<(), StoreError> {
        let erc20_json = record.erc20.as_ref().map(serde_json::to_string).transpose()?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO ct_addresses
                    (chain_id, address, name, is_contract, code_hash, standard, erc20_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &record.chain_id,
                    address_hex(&record.address),
                    &record.name,
                    record.is_contract,
                    record.code_hash.to_string(),
                    record.standard.map(|s| s.to_string()),
                    erc20_json,
                ],
            )
            .map_err(sqlite_err)?;
        Ok(())
    }

    fn delete_address(&self, chain_id: &str, address: &Address) -> Result<bool, StoreError> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM ct_addresses WHERE chain_id = ?1 AND address = ?2",
                params![chain_id, address_hex(address)],
            )
            .map_err(sqlite_err)?;
        Ok(removed > 0)
    }
}

fn parse_standard(s: &str) -> Result<TokenStandard, StoreError> {
    match s {
        "ERC20" => Ok(TokenStandard::Erc20),
        "ERC721" => Ok(TokenStandard::Erc721),
        other => Err(StoreError::Corrupt {
            reason: format!("unknown token standard '{other}'"),
        }),
    }
}

fn corrupt(column: &str, value: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        reason: format!("{column} '{value}': {err}"),
    }
}

fn sqlite_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaintrace_core::semantics::{AddressMetadata, FunctionSignature, ParamDescriptor};

    fn usdc() -> AddressMetadata {
        let address: Address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap();
        let mut meta = AddressMetadata::unknown_contract("mainnet", address, B256::repeat_byte(0x42));
        meta.name = "FiatTokenProxy".into();
        meta.contract.name = "FiatTokenProxy".into();
        meta.contract.functions.insert(
            "0xa9059cbb".into(),
            FunctionSignature {
                selector: "0xa9059cbb".into(),
                name: "transfer".into(),
                inputs: vec![ParamDescriptor::new("to", "address"), ParamDescriptor::new("value", "uint256")],
                outputs: vec![ParamDescriptor::new("", "bool")],
            },
        );
        meta.standard = Some(TokenStandard::Erc20);
        meta.erc20 = Some(Erc20Data {
            name: "USD Coin".into(),
            symbol: "USDC".into(),
            decimals: 6,
        });
        meta
    }

    #[test]
    fn round_trip_and_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        let mut meta = usdc();
        store.put_semantics(&meta).unwrap();
        assert_eq!(store.get_raw_semantics("mainnet", &meta.address).unwrap(), Some(meta.clone()));

        meta.name = "Centre: USD Coin".into();
        store.put_semantics(&meta).unwrap();
        let loaded = store.get_raw_semantics("mainnet", &meta.address).unwrap().unwrap();
        assert_eq!(loaded.name, "Centre: USD Coin");
    }

    #[test]
    fn eoa_and_missing_rows() {
        let store = SqliteStore::in_memory().unwrap();
        let eoa = AddressMetadata::eoa("mainnet", Address::repeat_byte(7));
        store.put_semantics(&eoa).unwrap();
        let loaded = store.get_raw_semantics("mainnet", &eoa.address).unwrap().unwrap();
        assert!(!loaded.is_contract);
        assert!(loaded.standard.is_none());
        assert!(store.get_raw_semantics("mainnet", &Address::ZERO).unwrap().is_none());
    }

    #[test]
    fn delete_address_row() {
        let store = SqliteStore::in_memory().unwrap();
        let meta = usdc();
        store.put_semantics(&meta).unwrap();
        assert!(store.delete_address("mainnet", &meta.address).unwrap());
        assert!(store.get_address("mainnet", &meta.address).unwrap().is_none());
        assert!(store.get_contract(&meta.contract.code_hash).unwrap().is_some());
    }
}
