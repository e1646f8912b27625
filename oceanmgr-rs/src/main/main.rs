use oceanmgr_rs::ocean::{get_earnings_loop, print_current_earnings};

use common_rs::common_db::get_db_file;
use rusqlite::Connection;
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let mother_pool_user = env::var("MOTHER_POOL_USER").unwrap_or_default();
    println!("Mother pool user: {mother_pool_user}");
    if mother_pool_user.len() < 10 {
        return Err(format!("Missing mother pool user, set it in .env! ({mother_pool_user})").into());
    }

    let dbfile = get_db_file("ocean.db", false);
    let mut conn = Connection::open(&dbfile)?;

    // Start with printing the current snapshot, to check DB, etc
    print_current_earnings(&conn);

    get_earnings_loop(&mut conn, &mother_pool_user);

    Ok(())
}
