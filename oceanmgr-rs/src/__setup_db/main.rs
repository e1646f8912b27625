use common_rs::common_db::get_db_file;
use oceanmgr_rs::db_oc::db_setup_1;

use rusqlite::Connection;
use std::io::stdin;

fn main() {
    let dbfile = get_db_file("ocean.db", true);

    println!("Initialize DB {dbfile}. Press Y to continue");
    let mut buffer = String::new();
    stdin().read_line(&mut buffer).unwrap();
    let lineread = buffer.trim_end().to_uppercase().to_string();
    if lineread != "Y" {
        println!("Aborting");
        std::process::exit(-1);
    }
    // OK, continue
    // Connect to SQLite database
    let conn = Connection::open(&dbfile).unwrap();
    db_setup_1(&conn).unwrap();
    let _ = conn.close();

    println!("New empty db created, don't forget to rename! {dbfile}");
}
