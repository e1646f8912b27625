use oceanmgr_rs::ocean::{dump_snapshots, print_current_earnings};

use common_rs::common_db::get_db_file;
use rusqlite::{Connection, OpenFlags};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let dbfile = get_db_file("ocean.db", false);
    // Read-only connection, reporting must not block the ingest loop
    let conn = Connection::open_with_flags(&dbfile, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    print_current_earnings(&conn);

    dump_snapshots(&conn);

    Ok(())
}
