use crate::dto_oc::{BlockEarning, EarningSnapshot};
use crate::html_parse::key_value_pairs_from_html;

use chrono::{DateTime, NaiveDateTime};
use reqwest::blocking::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub static OCEAN_WEB_ROOT_URL: &str = "https://ocean.xyz";
pub static OCEAN_API_ROOT_URL: &str = "https://ocean.xyz/data";

static HTTP_TIMEOUT_SECS: u64 = 30;

// Scrape failures are recoverable at fetch granularity: the cycle aborts and
// the next cycle retries. Repeated Parse/IncompleteData occurrences mean the
// remote page format changed.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("could not fetch, status code {status}, url {url}")]
    Fetch { status: u16, url: String },
    #[error("could not fetch, {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not parse value '{0}'")]
    Parse(String),
    #[error("missing expected value, {0}")]
    IncompleteData(String),
}

fn http_client() -> Result<Client, ScrapeError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

fn now_utc() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

// Amount strings look like "0.00123456 BTC": decimal magnitude, then the
// unit. Bare decimals (the CSV amount columns) parse the same way.
pub fn sats_from_amount_str(amount: &str) -> Result<i64, ScrapeError> {
    let magnitude = amount.trim().split(' ').next().unwrap_or_default();
    let num = magnitude
        .parse::<f64>()
        .map_err(|_| ScrapeError::Parse(amount.to_string()))?;
    Ok((num * 100_000_000.0) as i64)
}

// Timestamps from the pool are ISO-8601-like, without zone info they are UTC
pub fn time_from_timestamp_str(timestamp: &str) -> Result<u32, ScrapeError> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(dt.timestamp() as u32);
    }
    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ScrapeError::Parse(timestamp.to_string()))?;
    Ok(naive.and_utc().timestamp() as u32)
}

// Build a snapshot from the stats page markup. The three needed figures are
// matched by label substring, case-insensitively; if any is missing the whole
// snapshot fails rather than defaulting to zero, a zero here would poison the
// ledger with plausible-looking data.
pub fn snapshot_from_html(html: &str, time: u32) -> Result<EarningSnapshot, ScrapeError> {
    let values = key_value_pairs_from_html(html);
    // println!("Found {} key-value pairs", values.len());

    let mut estimated_in_window = None;
    let mut lifetime_accounted = None;
    let mut accounted_unpaid = None;
    for (k, v) in &values {
        let k_upper = k.to_uppercase();
        if k_upper.contains("ESTIMATED REWARDS IN WINDOW") {
            estimated_in_window = Some(sats_from_amount_str(v)?);
        } else if k_upper.contains("LIFETIME EARNINGS") {
            lifetime_accounted = Some(sats_from_amount_str(v)?);
        } else if k_upper.contains("UNPAID EARNINGS") {
            accounted_unpaid = Some(sats_from_amount_str(v)?);
        }
    }

    let (estimated, lifetime, unpaid) =
        match (estimated_in_window, lifetime_accounted, accounted_unpaid) {
            (Some(e), Some(l), Some(u)) => (e, l, u),
            _ => {
                return Err(ScrapeError::IncompleteData(format!(
                    "{:?} {:?} {:?}",
                    estimated_in_window, lifetime_accounted, accounted_unpaid
                )))
            }
        };

    // Paid is derived; it can go negative if the page figures are inconsistent
    let accounted_paid = lifetime - unpaid;

    Ok(EarningSnapshot::new(time, accounted_paid, unpaid, estimated))
}

pub fn get_earning_snapshot(ocean_account: &str) -> Result<EarningSnapshot, ScrapeError> {
    let url = format!("{OCEAN_WEB_ROOT_URL}/stats/{ocean_account}");

    let response = http_client()?.get(&url).send()?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(ScrapeError::Fetch { status, url });
    }
    let text = response.text()?;

    // Snapshot time is the wall clock of the call, not a scraped value
    snapshot_from_html(&text, now_utc())
}

// Parse the earnings CSV export: a header row, then
// timestamp, block hash, two ignored columns, earned amount, optional fee.
// Short rows (trailing blanks) are skipped. Row order is kept, the remote
// sends newest first.
pub fn block_earnings_from_csv(text: &str) -> Result<Vec<BlockEarning>, ScrapeError> {
    let mut arr = Vec::new();
    for (lc, line) in text.split('\n').enumerate() {
        if lc == 0 || line.is_empty() {
            continue;
        }
        let words = line.split(',').collect::<Vec<&str>>();
        if words.len() < 5 {
            continue;
        }
        let time = time_from_timestamp_str(words[0])?;
        let earned_sats = sats_from_amount_str(words[4])? as u64;
        let pool_fee = if words.len() >= 6 {
            sats_from_amount_str(words[5])? as u32
        } else {
            0
        };
        let earn_obj = BlockEarning::new(time, words[1].to_string(), earned_sats, pool_fee);
        // println!("{}", earn_obj.to_string());
        arr.push(earn_obj);
    }
    Ok(arr)
}

pub fn get_block_earnings(ocean_account: &str) -> Result<Vec<BlockEarning>, ScrapeError> {
    let url = format!("{OCEAN_API_ROOT_URL}/csv/{ocean_account}/earnings");

    // The CSV endpoint wants a POST with an empty body
    let response = http_client()?.post(&url).send()?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(ScrapeError::Fetch { status, url });
    }
    let text = response.text()?;

    block_earnings_from_csv(&text)
}
