// Merchant Portal - admin CLI
//
//   merchant-portal init <db>
//   merchant-portal add-user <db> <name> <email> <token>
//   merchant-portal show <db> <merchant-id>

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::sync::{Arc, Mutex};

use merchant_portal::{
    count_merchants, open_database, register_portal_user, MerchantStore, SqliteMerchantStore,
};

const USAGE: &str = "usage:
  merchant-portal init <db>
  merchant-portal add-user <db> <name> <email> <token>
  merchant-portal show <db> <merchant-id>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["init", db] => run_init(Path::new(db)),
        ["add-user", db, name, email, token] => run_add_user(Path::new(db), name, email, token),
        ["show", db, id] => run_show(Path::new(db), id),
        _ => {
            eprintln!("{}", USAGE);
            bail!("unrecognised arguments: {:?}", args);
        }
    }
}

fn run_init(db_path: &Path) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open_database(db_path)?;
    let count = count_merchants(&conn)?;

    println!("✓ Database ready at {} ({} merchants)", db_path.display(), count);
    Ok(())
}

fn run_add_user(db_path: &Path, name: &str, email: &str, token: &str) -> Result<()> {
    let conn = Arc::new(Mutex::new(open_database(db_path)?));
    let actor = register_portal_user(&conn, name, email, token)?;

    println!("✓ Registered portal user #{} <{}>", actor.id, actor.email);
    Ok(())
}

fn run_show(db_path: &Path, raw_id: &str) -> Result<()> {
    let id: i64 = raw_id
        .parse()
        .with_context(|| format!("Invalid merchant id: {}", raw_id))?;

    let store = SqliteMerchantStore::new(Arc::new(Mutex::new(open_database(db_path)?)));
    let merchant = store
        .find_by_id(id)?
        .with_context(|| format!("Merchant not found: {}", id))?;

    println!("{}", serde_json::to_string_pretty(&merchant.view())?);
    Ok(())
}
