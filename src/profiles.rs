//! Bounded per-user behavior history
//!
//! Each tracked user keeps a rolling window of recent amounts and a small set
//! of device fingerprints. Fingerprints are held as SHA-256 digests so the raw
//! device strings are never retained. The store holds at most `max_users`
//! profiles and evicts the least recently updated one when full.

use crate::TransactionRequest;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

pub type DeviceDigest = [u8; 32];

/// Hash a device fingerprint
pub fn device_digest(device: &str) -> DeviceDigest {
    Sha256::digest(device.as_bytes()).into()
}

/// Spending and device history for one user
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    amounts: VecDeque<f64>,
    devices: VecDeque<DeviceDigest>,
    last_updated: u64,
}

impl UserProfile {
    /// Mean of the retained amounts
    pub fn mean_amount(&self) -> Option<f64> {
        if self.amounts.is_empty() {
            return None;
        }
        Some(self.amounts.iter().sum::<f64>() / self.amounts.len() as f64)
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    pub fn knows_device(&self, digest: &DeviceDigest) -> bool {
        self.devices.contains(digest)
    }

    pub fn transaction_count(&self) -> usize {
        self.amounts.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn record(&mut self, amount: f64, digest: DeviceDigest, amount_len: usize, device_len: usize) {
        self.amounts.push_back(amount);
        while self.amounts.len() > amount_len {
            self.amounts.pop_front();
        }

        // Re-seen devices move to the back so the oldest unused one goes first
        if let Some(pos) = self.devices.iter().position(|d| *d == digest) {
            self.devices.remove(pos);
        }
        self.devices.push_back(digest);
        while self.devices.len() > device_len {
            self.devices.pop_front();
        }
    }
}

/// LRU-bounded collection of user profiles
#[derive(Debug)]
pub struct ProfileStore {
    profiles: HashMap<String, UserProfile>,
    max_users: usize,
    amount_len: usize,
    device_len: usize,
    clock: u64,
}

impl ProfileStore {
    pub fn new(max_users: usize, amount_len: usize, device_len: usize) -> Self {
        Self {
            profiles: HashMap::new(),
            max_users: max_users.max(1),
            amount_len: amount_len.max(1),
            device_len: device_len.max(1),
            clock: 0,
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    /// Fold a transaction into its user's history
    pub fn record(&mut self, request: &TransactionRequest) {
        self.clock += 1;

        if !self.profiles.contains_key(&request.user_id) && self.profiles.len() >= self.max_users {
            self.evict_least_recent();
        }

        let profile = self.profiles.entry(request.user_id.clone()).or_default();
        profile.record(
            request.amount,
            device_digest(&request.device),
            self.amount_len,
            self.device_len,
        );
        profile.last_updated = self.clock;
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .profiles
            .iter()
            .min_by_key(|(_, p)| p.last_updated)
            .map(|(user, _)| user.clone());

        if let Some(user) = oldest {
            log::debug!("Evicting profile for {} (store at {} users)", user, self.max_users);
            self.profiles.remove(&user);
        }
    }
}
