use chrono::DateTime;

// Block earning: a piece of earned earning, connected to a block found
#[derive(Debug, Clone)]
pub struct BlockEarning {
    pub time: u32,
    pub block_hash: String,
    pub earned_sats: u64,
    pub pool_fee: u32,
}

impl BlockEarning {
    pub fn new(time: u32, block_hash: String, earned_sats: u64, pool_fee: u32) -> Self {
        Self {
            time,
            block_hash,
            earned_sats,
            pool_fee,
        }
    }

    pub fn to_string(&self) -> String {
        let dt = DateTime::from_timestamp(self.time as i64, 0).unwrap_or_default();
        format!("{} {} {} {}", dt, self.block_hash, self.earned_sats, self.pool_fee)
    }
}

// Earning snapshot: a point-in-time balance reading from the pool stats page.
// Amounts are signed: accounted_paid is derived (lifetime minus unpaid) and
// can go negative if the pool figures are inconsistent, stored as-is.
#[derive(Debug, Clone)]
pub struct EarningSnapshot {
    pub time: u32,
    pub accounted_paid: i64,
    pub accounted_unpaid: i64,
    pub estimated: i64,
}

impl EarningSnapshot {
    pub fn new(time: u32, accounted_paid: i64, accounted_unpaid: i64, estimated: i64) -> Self {
        Self {
            time,
            accounted_paid,
            accounted_unpaid,
            estimated,
        }
    }

    pub fn total_accounted(&self) -> i64 {
        self.accounted_paid + self.accounted_unpaid
    }

    pub fn total(&self) -> i64 {
        self.total_accounted() + self.estimated
    }

    pub fn to_string(&self) -> String {
        let dt = DateTime::from_timestamp(self.time as i64, 0).unwrap_or_default();
        let line1 = format!(
            "acctd paid: {}   acctd unpaid: {}   estimated: {}",
            self.accounted_paid, self.accounted_unpaid, self.estimated
        );
        let line2 = format!(
            "total acctd {}   total {}   time {} {}",
            self.total_accounted(),
            self.total(),
            self.time,
            dt
        );
        format!("{line1}\n{line2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_totals() {
        let snap = EarningSnapshot::new(1000, 800_000, 200_000, 100_000);
        assert_eq!(snap.total_accounted(), 1_000_000);
        assert_eq!(snap.total(), 1_100_000);
    }

    #[test]
    fn test_block_earning_to_string() {
        let earn = BlockEarning::new(86400, "block_01".to_string(), 1234, 10);
        let s = earn.to_string();
        assert!(s.contains("1970-01-02"));
        assert!(s.contains("block_01"));
        assert!(s.contains("1234"));
    }

    #[test]
    fn test_snapshot_negative_paid() {
        // inconsistent pool figures pass through unclamped
        let snap = EarningSnapshot::new(1000, -500, 1500, 0);
        assert_eq!(snap.total_accounted(), 1000);
        assert_eq!(snap.total(), 1000);
    }
}
