use std::env;
use std::fs;

// Return the data dir: DB_DIR from the environment, or the current dir
pub fn get_data_dir() -> String {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Read DB_DIR from environment variables
    match env::var("DB_DIR") {
        Err(_) => {
            let local_dir = env::current_dir().unwrap();
            println!(
                "Using local directory as data dir, ({})",
                local_dir.to_str().unwrap_or_default()
            );
            local_dir.to_str().unwrap_or_default().to_string()
        }
        Ok(data_dir) => {
            println!("Using data dir from env: '{data_dir}'");
            data_dir
        }
    }
}

// Check and return full path of a DB file
pub fn get_db_file(db_file_name: &str, create_mode: bool) -> String {
    let data_dir = get_data_dir();
    let db_file_name = if create_mode {
        "_new_".to_string() + db_file_name
    } else {
        db_file_name.to_string()
    };
    let dbfile = data_dir + "/" + &db_file_name;
    if !create_mode {
        if !fs::exists(&dbfile).unwrap_or(false) {
            println!("DB file does not exist! {dbfile}");
            std::process::exit(-1);
        }
    }
    println!("Using data file: '{dbfile}'");
    dbfile
}
