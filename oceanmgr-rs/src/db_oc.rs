use crate::dto_oc::{BlockEarning, EarningSnapshot};

use rusqlite::{Connection, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::vec::Vec;

pub fn db_setup_1(conn: &Connection) -> Result<(), Box<dyn Error>> {
    // Create table OC_BLOCK_EARN, one row per block, keyed by BlockHash
    let _ = conn.execute(
        "CREATE TABLE IF NOT EXISTS OC_BLOCK_EARN \
        (Time INTEGER, BlockHash VARCHAR(100), Earning INTEGER, PoolFee INTEGER, TimeAddedFirst INTEGER, TimeUpdated INTEGER)",
        [],
    )?;
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS OcBlockEarnTime ON OC_BLOCK_EARN (Time)",
        [],
    )?;
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS OcBlockEarnHash ON OC_BLOCK_EARN (BlockHash)",
        [],
    )?;

    // Create table OC_EARN, append-only snapshots
    let _ = conn.execute(
        "CREATE TABLE IF NOT EXISTS OC_EARN (Time INTEGER, Estimated INTEGER, AcctdUnpaid INTEGER, AcctdPaid INTEGER)",
        [],
    )?;
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS OcEarnTime ON OC_EARN (Time)",
        [],
    )?;

    Ok(())
}

fn blockearning_from_row(row: &Row) -> Result<BlockEarning, rusqlite::Error> {
    // println!("blockearning_from_row {0:?}", row);
    let b = BlockEarning::new(
        row.get(0)?,
        row.get::<_, String>(1)?,
        row.get(2)?,
        row.get(3)?,
    );
    Ok(b)
}

fn snapshot_from_row(row: &Row) -> Result<EarningSnapshot, rusqlite::Error> {
    // column order: Time, Estimated, AcctdUnpaid, AcctdPaid
    let s = EarningSnapshot::new(
        row.get(0)?,
        row.get::<_, i64>(3)?,
        row.get::<_, i64>(2)?,
        row.get::<_, i64>(1)?,
    );
    Ok(s)
}

// Upsert by block hash. On first sight TimeAddedFirst and TimeUpdated are
// both `now`; on a resight the pool may have revised its figures, so Time,
// Earning, PoolFee and TimeUpdated are overwritten and TimeAddedFirst keeps
// the first-sight provenance.
pub fn insert_or_update_block_earning(
    conn: &Connection,
    earning: &BlockEarning,
    now: u32,
) -> Result<(), Box<dyn Error>> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM OC_BLOCK_EARN WHERE BlockHash = ?1")?;
    let cnt = stmt.query_one([&earning.block_hash], |row| row.get::<_, u32>(0))?;
    if cnt >= 1 {
        // already present, update
        let _ = conn.execute(
            "UPDATE OC_BLOCK_EARN SET Time = ?1, Earning = ?2, PoolFee = ?3, TimeUpdated = ?4 \
            WHERE BlockHash = ?5",
            (earning.time, earning.earned_sats, earning.pool_fee, now, &earning.block_hash),
        )?;
        // println!("updated");
        return Ok(());
    }
    // not present, insert
    let _ = conn.execute(
        "INSERT INTO OC_BLOCK_EARN \
            (Time, BlockHash, Earning, PoolFee, TimeAddedFirst, TimeUpdated) \
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (earning.time, &earning.block_hash, earning.earned_sats, earning.pool_fee, now, now),
    )?;
    // println!("inserted");
    Ok(())
}

pub fn block_earnings_count(conn: &Connection) -> Result<u32, Box<dyn Error>> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM OC_BLOCK_EARN")?;
    let res = stmt.query_one([], |row| row.get::<_, u32>(0))?;
    Ok(res)
}

pub fn block_earnings_sum(conn: &Connection) -> Result<u64, Box<dyn Error>> {
    let mut stmt = conn.prepare("SELECT SUM(Earning) FROM OC_BLOCK_EARN")?;
    // SUM over an empty table is NULL
    let res = stmt.query_one([], |row| row.get::<_, Option<u64>>(0))?;
    Ok(res.unwrap_or(0))
}

pub fn get_last_block(conn: &Connection) -> Result<Option<BlockEarning>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT Time, BlockHash, Earning, PoolFee, TimeAddedFirst, TimeUpdated \
        FROM OC_BLOCK_EARN \
        ORDER BY Time DESC \
        LIMIT 1",
    )?;
    match stmt.query_one([], |row| blockearning_from_row(row)) {
        Ok(b) => Ok(Some(b)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

// Get the blocks after a certain time, oldest first.
// Old time is typically the time of the already processed last block.
pub fn get_new_blocks(conn: &Connection, old_time: u32) -> Result<Vec<BlockEarning>, Box<dyn Error>> {
    let query_str =
        "SELECT Time, BlockHash, Earning, PoolFee, TimeAddedFirst, TimeUpdated \
        FROM OC_BLOCK_EARN \
        WHERE Time > ?1 \
        ORDER BY Time ASC ";

    let mut stmt = conn.prepare(query_str)?;
    let vector = stmt.query_map([old_time], |row| blockearning_from_row(row))?
        .filter(|ber| ber.is_ok())
        .map(|ber| ber.unwrap())
        .collect::<Vec<BlockEarning>>();
    Ok(vector)
}

// Count the blocks after a certain time.
pub fn count_new_blocks(conn: &Connection, old_time: u32) -> Result<u32, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM OC_BLOCK_EARN WHERE Time > ?"
    )?;

    let res = stmt.query_one([old_time], |row| row.get::<_, u32>(0))?;
    Ok(res)
}

// Pure insert, snapshots are append-only and never deduplicated
pub fn insert_earn_snapshot(conn: &Connection, earns: &EarningSnapshot) -> Result<(), Box<dyn Error>> {
    let _ = conn.execute(
        "INSERT INTO OC_EARN \
            (Time, Estimated, AcctdUnpaid, AcctdPaid) \
            VALUES (?1, ?2, ?3, ?4)",
        (earns.time, earns.estimated, earns.accounted_unpaid, earns.accounted_paid),
    )?;
    Ok(())
}

pub fn get_last_snapshot(conn: &Connection) -> Result<Option<EarningSnapshot>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT Time, Estimated, AcctdUnpaid, AcctdPaid FROM OC_EARN ORDER BY Time DESC LIMIT 1",
    )?;
    match stmt.query_one([], |row| snapshot_from_row(row)) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn get_last_snapshot_before(
    conn: &Connection,
    before_time: u32,
) -> Result<Option<EarningSnapshot>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT Time, Estimated, AcctdUnpaid, AcctdPaid FROM OC_EARN \
        WHERE Time < ?1 ORDER BY Time DESC LIMIT 1",
    )?;
    match stmt.query_one([before_time], |row| snapshot_from_row(row)) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

// All snapshots as time -> (total, paid)
pub fn get_all_snapshots(conn: &Connection) -> Result<BTreeMap<u32, (i64, i64)>, Box<dyn Error>> {
    let mut stmt = conn.prepare(
        "SELECT Time, Estimated, AcctdUnpaid, AcctdPaid FROM OC_EARN ORDER BY Time DESC",
    )?;
    let mut res = BTreeMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    for row in rows {
        let (time, estimated, unpaid, paid) = row?;
        let total = paid + unpaid + estimated;
        res.insert(time, (total, paid));
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_db(conn: &Connection) -> Result<(), Box<dyn Error>> {
        db_setup_1(conn)?;
        conn.execute("INSERT INTO OC_BLOCK_EARN (Time, BlockHash, Earning, PoolFee, TimeAddedFirst, TimeUpdated) VALUES (1001, 'block_01', 11, 1, 1001, 1001);", [])?;
        conn.execute("INSERT INTO OC_BLOCK_EARN (Time, BlockHash, Earning, PoolFee, TimeAddedFirst, TimeUpdated) VALUES (1101, 'block_02', 22, 2, 1101, 1101);", [])?;
        Ok(())
    }

    #[test]
    fn test_empty_store_defaults() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        db_setup_1(&connection)?;

        // a fresh store is a normal state, not an error
        assert_eq!(block_earnings_count(&connection)?, 0);
        assert_eq!(block_earnings_sum(&connection)?, 0);
        assert!(get_last_block(&connection)?.is_none());
        assert_eq!(get_new_blocks(&connection, 0)?.len(), 0);
        assert_eq!(count_new_blocks(&connection, 0)?, 0);
        assert!(get_last_snapshot(&connection)?.is_none());
        assert!(get_last_snapshot_before(&connection, 9999)?.is_none());
        assert_eq!(get_all_snapshots(&connection)?.len(), 0);

        Ok(())
    }

    #[test]
    fn test_setup_is_create_if_absent() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        db_setup_1(&connection)?;
        db_setup_1(&connection)?;
        assert_eq!(block_earnings_count(&connection)?, 0);
        Ok(())
    }

    #[test]
    fn test_insert_or_update_block_earning() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        db_setup_1(&connection)?;

        let e1 = BlockEarning::new(1001, "block_01".to_string(), 1000, 10);
        insert_or_update_block_earning(&connection, &e1, 5000)?;
        assert_eq!(block_earnings_count(&connection)?, 1);
        assert_eq!(block_earnings_sum(&connection)?, 1000);

        // resight of the same hash with revised figures, count stays at 1
        let e2 = BlockEarning::new(1002, "block_01".to_string(), 1500, 15);
        insert_or_update_block_earning(&connection, &e2, 6000)?;
        assert_eq!(block_earnings_count(&connection)?, 1);
        assert_eq!(block_earnings_sum(&connection)?, 1500);

        let mut stmt = connection.prepare(
            "SELECT Time, Earning, PoolFee, TimeAddedFirst, TimeUpdated \
            FROM OC_BLOCK_EARN WHERE BlockHash = 'block_01'",
        )?;
        let (time, earning, pool_fee, added_first, updated) = stmt.query_one([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;
        assert_eq!(time, 1002);
        assert_eq!(earning, 1500);
        assert_eq!(pool_fee, 15);
        // first-sight provenance is kept, only the update time moves
        assert_eq!(added_first, 5000);
        assert_eq!(updated, 6000);

        Ok(())
    }

    #[test]
    fn test_get_last_block() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        create_test_db(&connection)?;

        let last = get_last_block(&connection)?.ok_or("no last block")?;
        assert_eq!(last.block_hash, "block_02");
        assert_eq!(last.time, 1101);
        assert_eq!(last.earned_sats, 22);

        Ok(())
    }

    #[test]
    fn test_count_new_blocks() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        create_test_db(&connection)?;

        // Test our function
        let count = count_new_blocks(&connection, 900)?;
        assert_eq!(count, 2);

        Ok(())
    }

    #[test]
    fn test_get_new_blocks() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        create_test_db(&connection)?;

        { // all
            let blocks = get_new_blocks(&connection, 900)?;
            assert_eq!(blocks.iter().len(), 2);
            // oldest first
            assert_eq!(blocks[0].block_hash, "block_01");
            assert_eq!(blocks[1].block_hash, "block_02");
        }
        { // later time
            let blocks = get_new_blocks(&connection, 1050)?;
            assert_eq!(blocks.iter().len(), 1);
        }
        { // time just below a block
            let blocks = get_new_blocks(&connection, 1000)?;
            assert_eq!(blocks.iter().len(), 2);
        }
        { // time just at a block, comparison is strict
            let blocks = get_new_blocks(&connection, 1001)?;
            assert_eq!(blocks.iter().len(), 1);
        }
        { // time just after a block
            let blocks = get_new_blocks(&connection, 1002)?;
            assert_eq!(blocks.iter().len(), 1);
        }
        { // time after all blocks
            let blocks = get_new_blocks(&connection, 2000)?;
            assert_eq!(blocks.iter().len(), 0);
        }

        Ok(())
    }

    #[test]
    fn test_snapshots() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        db_setup_1(&connection)?;

        let s1 = EarningSnapshot::new(1000, 30, 20, 10);
        let s2 = EarningSnapshot::new(2000, 35, 25, 15);
        insert_earn_snapshot(&connection, &s1)?;
        insert_earn_snapshot(&connection, &s2)?;

        let last = get_last_snapshot(&connection)?.ok_or("no snapshot")?;
        assert_eq!(last.time, 2000);
        assert_eq!(last.accounted_paid, 35);
        assert_eq!(last.accounted_unpaid, 25);
        assert_eq!(last.estimated, 15);

        { // strictly before the newest
            let snap = get_last_snapshot_before(&connection, 2000)?.ok_or("no snapshot")?;
            assert_eq!(snap.time, 1000);
        }
        { // before all data
            let snap = get_last_snapshot_before(&connection, 1000)?;
            assert!(snap.is_none());
        }

        let all = get_all_snapshots(&connection)?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[&1000], (60, 30));
        assert_eq!(all[&2000], (75, 35));

        Ok(())
    }

    #[test]
    fn test_snapshots_are_not_deduplicated() -> Result<(), Box<dyn Error>> {
        let connection = Connection::open_in_memory()?;
        db_setup_1(&connection)?;

        let s = EarningSnapshot::new(1000, 30, 20, 10);
        insert_earn_snapshot(&connection, &s)?;
        insert_earn_snapshot(&connection, &s)?;

        let mut stmt = connection.prepare("SELECT COUNT(*) FROM OC_EARN")?;
        let cnt = stmt.query_one([], |row| row.get::<_, u32>(0))?;
        assert_eq!(cnt, 2);

        Ok(())
    }
}
