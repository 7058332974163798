//! Blocking REST client for the beat catalog and purchase endpoints
//!
//! All paths are relative to `ApiConfig::base_url`. Purchase and download
//! endpoints need a bearer token; a 401/403 answer drops the token so the
//! caller can prompt for a new login.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{CatalogError, Result};
use super::messages::{
    ConfirmPaymentRequest, PaymentConfirmation, PaymentIntent, PaymentIntentRequest, PurchaseCheck,
};
use crate::config::ApiConfig;
use crate::types::{Beat, BeatId, Tier};

/// Upper bound on a purchased download (stems archives are large)
const MAX_DOWNLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Longest error body kept in `CatalogError::Http`
const MAX_ERROR_MESSAGE: usize = 512;

/// Client for the beatstore REST backend
pub struct CatalogClient {
    agent: ureq::Agent,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl CatalogClient {
    /// Create a client from the API section of the config
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(normalize_token(config.token.clone())),
        }
    }

    fn token_lock(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace (or clear) the bearer token
    pub fn set_token(&self, token: Option<String>) {
        *self.token_lock() = normalize_token(token);
    }

    pub fn token(&self) -> Option<String> {
        self.token_lock().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token_lock().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self.agent.request(method, &self.url(path));
        match self.token_lock().as_deref() {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn send(&self, request: ureq::Request, body: Option<String>) -> Result<ureq::Response> {
        let url = request.url().to_string();
        let result = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(&body),
            None => request.call(),
        };

        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status @ (401 | 403), _)) => {
                log::warn!("send: {} answered {}, forgetting token", url, status);
                self.set_token(None);
                Err(CatalogError::Unauthorized)
            }
            Err(ureq::Error::Status(status, response)) => {
                let mut message = response.into_string().unwrap_or_default();
                if message.len() > MAX_ERROR_MESSAGE {
                    let mut end = MAX_ERROR_MESSAGE;
                    while !message.is_char_boundary(end) {
                        end -= 1;
                    }
                    message.truncate(end);
                }
                log::warn!("send: {} answered {}", url, status);
                Err(CatalogError::Http { status, message })
            }
            Err(ureq::Error::Transport(e)) => {
                log::warn!("send: {} unreachable: {}", url, e);
                Err(CatalogError::Transport(e.to_string()))
            }
        }
    }

    fn get_json<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<T> {
        read_json(self.send(request, None)?)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_string(body).map_err(|e| CatalogError::Decode(e.to_string()))?;
        read_json(self.send(self.request("POST", path), Some(body))?)
    }

    /// Full catalog, in server order
    pub fn beats(&self) -> Result<Vec<Beat>> {
        let beats: Vec<Beat> = self.get_json(self.request("GET", "beats/"))?;
        log::info!("beats: Loaded {} beat(s)", beats.len());
        Ok(beats)
    }

    /// Whether the signed-in user already owns `tier` of a beat
    pub fn check_purchase(&self, beat: BeatId, tier: Tier) -> Result<bool> {
        let request = self
            .request("GET", &format!("beats/{beat}/check_purchase/"))
            .query("type", tier.as_str());
        let check: PurchaseCheck = self.get_json(request)?;
        Ok(check.has_purchase)
    }

    /// Every tier the user owns for a beat (empty when signed out)
    pub fn owned_tiers(&self, beat: BeatId) -> Result<Vec<Tier>> {
        if !self.is_signed_in() {
            return Ok(Vec::new());
        }
        let mut owned = Vec::new();
        for tier in Tier::ALL {
            if self.check_purchase(beat, tier)? {
                owned.push(tier);
            }
        }
        Ok(owned)
    }

    pub fn has_any_purchase(&self, beat: BeatId) -> Result<bool> {
        Ok(!self.owned_tiers(beat)?.is_empty())
    }

    /// Start checkout; the returned secret goes to the payment processor SDK
    pub fn create_payment_intent(&self, beat: BeatId, tier: Tier, price: f64) -> Result<PaymentIntent> {
        let body = PaymentIntentRequest {
            download_type: tier,
            price_paid: price,
        };
        let intent: PaymentIntent =
            self.post_json(&format!("beats/{beat}/create_payment_intent/"), &body)?;
        log::info!(
            "create_payment_intent: Beat {} ({}) -> intent {}",
            beat,
            tier,
            intent.payment_intent_id
        );
        Ok(intent)
    }

    /// Record a payment the processor reported as successful
    pub fn confirm_payment(&self, beat: BeatId, payment_intent_id: &str) -> Result<PaymentConfirmation> {
        let body = ConfirmPaymentRequest {
            payment_intent_id: payment_intent_id.to_string(),
        };
        let confirmation: PaymentConfirmation =
            self.post_json(&format!("beats/{beat}/confirm_payment/"), &body)?;
        log::info!(
            "confirm_payment: Beat {} purchase {} confirmed",
            beat,
            confirmation.purchase_id
        );
        Ok(confirmation)
    }

    /// Fetch a purchased file
    pub fn download(&self, beat: BeatId, tier: Tier) -> Result<Vec<u8>> {
        let request = self
            .request("GET", &format!("beats/{beat}/download/"))
            .query("type", tier.as_str());
        let response = self.send(request, None)?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_DOWNLOAD_BYTES)
            .read_to_end(&mut bytes)?;
        log::info!("download: Beat {} ({}) {} bytes", beat, tier, bytes.len());
        Ok(bytes)
    }

    /// Download a purchased file into `dir` and return its path
    ///
    /// Written to a `.part` file first so an interrupted download never
    /// leaves a truncated file under the final name.
    pub fn download_to(&self, beat: &Beat, tier: Tier, dir: &Path) -> Result<PathBuf> {
        let bytes = self.download(beat.id, tier)?;

        fs::create_dir_all(dir)?;
        let path = dir.join(sanitize_file_name(&beat.download_file_name(tier)));
        let temp_path = path.with_extension("part");

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        drop(file);
        fs::rename(&temp_path, &path)?;

        log::info!("download_to: Saved {:?}", path);
        Ok(path)
    }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T> {
    serde_json::from_reader(response.into_reader()).map_err(|e| CatalogError::Decode(e.to_string()))
}

/// Drop empty and placeholder tokens left behind by other clients
fn normalize_token(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && t != "null" && t != "undefined")
}

/// Replace characters that cannot appear in a file name
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
