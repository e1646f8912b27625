use crate::db_oc;
use crate::ocean_web;

use rusqlite::Connection;
use std::env;
use std::error::Error;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub static DEFAULT_POLL_SECS: u64 = 10 * 60;

fn now_utc() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

fn now_utc_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// Fetch the earnings CSV and upsert every row, one transaction per batch.
// Returns the number of rows seen (not the number of new blocks).
pub fn get_and_save_block_earnings(
    conn: &mut Connection,
    ocean_account: &str,
) -> Result<u32, Box<dyn Error>> {
    let earns = ocean_web::get_block_earnings(ocean_account)?;

    let now_utc = now_utc();

    let conntx = conn.transaction()?;
    let mut cnt = 0;
    for e in &earns {
        db_oc::insert_or_update_block_earning(&conntx, e, now_utc)?;
        cnt += 1;
    }
    let _ = conntx.commit()?;
    Ok(cnt)
}

pub fn get_and_save_earning_snapshot(
    conn: &Connection,
    ocean_account: &str,
) -> Result<(), Box<dyn Error>> {
    let earn = ocean_web::get_earning_snapshot(ocean_account)?;
    db_oc::insert_earn_snapshot(conn, &earn)?;
    Ok(())
}

fn try_print_current_earnings(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let block_earn_cnt = db_oc::block_earnings_count(conn)?;
    let block_earn_sum = db_oc::block_earnings_sum(conn)?;
    let last_block = db_oc::get_last_block(conn)?;
    let last_block_time = match &last_block {
        Some(block) => block.time,
        None => 0,
    };
    println!("Sum block earnings: {block_earn_sum} (in {block_earn_cnt} blocks, last block {last_block_time})");

    match db_oc::get_last_snapshot(conn)? {
        None => println!("No current snapshot could be read"),
        Some(snap) => {
            println!("Current latest snapshot:");
            println!("{}", snap.to_string());
        }
    }
    Ok(())
}

// Read-only report of the current totals. A reporting failure is printed
// and swallowed, it must not take the polling loop down.
pub fn print_current_earnings(conn: &Connection) {
    match try_print_current_earnings(conn) {
        Ok(_) => {}
        Err(err) => println!("ERROR: print_current_earnings: {err}"),
    }
}

pub fn dump_snapshots(conn: &Connection) {
    match db_oc::get_all_snapshots(conn) {
        Ok(res) => {
            for (time, (total, paid)) in &res {
                println!("{time}: {total} {paid}");
            }
        }
        Err(err) => println!("ERROR: dump_snapshots: {err}"),
    }
}

// Wake times are anchored to the loop start plus whole period multiples, so
// a slow cycle does not push every later wake back. A cycle that overruns
// its slot sleeps the minimum 1 second and the schedule catches up.
pub struct Schedule {
    next_time: f64,
    period_secs: f64,
}

impl Schedule {
    pub fn new(start_time: f64, period_secs: f64) -> Self {
        Self {
            next_time: start_time,
            period_secs,
        }
    }

    // Consume one slot and return how long to sleep until the new target
    pub fn advance(&mut self, now: f64) -> f64 {
        self.next_time = self.next_time + self.period_secs;
        f64::max(self.next_time - now, 1.0)
    }

    pub fn next_time(&self) -> f64 {
        self.next_time
    }
}

// One polling cycle: block earnings, then the snapshot, then a read-only
// report. The first failure aborts the cycle; nothing is half-applied past
// the failed step.
fn iteration(conn: &mut Connection, ocean_account: &str) -> Result<(), Box<dyn Error>> {
    let res_cnt = get_and_save_block_earnings(conn, ocean_account)?;
    println!("Current block earnings saved ({res_cnt})");

    get_and_save_earning_snapshot(conn, ocean_account)?;
    println!("Current earnings snapshot saved");

    print_current_earnings(conn);
    Ok(())
}

fn poll_secs_from_env() -> u64 {
    env::var("OCEAN_POLL_SECS")
        .unwrap_or_default()
        .parse::<u64>()
        .unwrap_or(DEFAULT_POLL_SECS)
}

// Runs until the process is killed. A failed cycle is logged and still
// consumes its schedule slot, so the next wake stays on the period grid.
pub fn get_earnings_loop(conn: &mut Connection, ocean_account: &str) {
    let sleep_secs = poll_secs_from_env();
    println!("Oceanmgr: loop starting, period {sleep_secs} secs...");

    let mut schedule = Schedule::new(now_utc_f64(), sleep_secs as f64);

    loop {
        match iteration(conn, ocean_account) {
            Ok(_) => {}
            Err(err) => {
                println!("ERROR: get_earnings_loop: {err}");
            }
        }

        let to_sleep = schedule.advance(now_utc_f64());
        println!(
            "Sleeping for {} secs... (next_time {})",
            to_sleep.round(),
            schedule.next_time().round()
        );
        thread::sleep(Duration::from_secs_f64(to_sleep));
    }
}
