use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod models;

use models::{DonationInput, DonationRecord, DonationStatus, HistoryEvent, Ngo, Restaurant};

pub type DbPool = SqlitePool;

/// NGO directory seeded on first start, matching the production deployment.
const SEED_NGOS: &[(&str, &str, &str, &str)] = &[
    ("Helping Hands", "Tambaram", "helpinghands@example.org", "9876543210"),
    ("Smile Foundation", "Pallavaram", "smile@example.org", "9554862315"),
    ("Food for all", "Guindy", "foodforall@example.org", "8777564354"),
    ("Hope Home", "Tambaram", "hopehome@example.org", "6655884426"),
    ("Care & Share", "Tambaram", "careshare@example.org", "7765894159"),
];

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:mealbridge.db".to_string());
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    seed_ngos(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests. A single connection keeps every query on the
/// same ephemeral database; the NGO directory is left empty so tests control
/// it.
pub async fn init_memory_pool() -> anyhow::Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS ngos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            location TEXT NOT NULL,
            email TEXT NOT NULL,
            contact TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            restaurant TEXT NOT NULL,
            contact TEXT NOT NULL,
            location TEXT NOT NULL,
            food_type TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            expiry TEXT NOT NULL,
            email TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'Pending',
            ngo_assigned TEXT NOT NULL DEFAULT 'Not yet Assigned',
            contacted TEXT NOT NULL DEFAULT '[]',
            history TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS restaurants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            location TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            contact TEXT NOT NULL,
            password_hash TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ngos_location ON ngos(location)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn seed_ngos(pool: &DbPool) -> anyhow::Result<()> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM ngos")
        .fetch_one(pool)
        .await?
        .get("n");
    if count > 0 {
        return Ok(());
    }

    for (name, location, email, contact) in SEED_NGOS {
        insert_ngo(pool, name, location, email, contact).await?;
    }
    tracing::info!(count = SEED_NGOS.len(), "seeded NGO directory");
    Ok(())
}

// ---------------------------------------------------------------------------
// NGO directory
// ---------------------------------------------------------------------------

pub async fn insert_ngo(
    pool: &DbPool,
    name: &str,
    location: &str,
    email: &str,
    contact: &str,
) -> anyhow::Result<i64> {
    let result = sqlx::query("INSERT INTO ngos (name, location, email, contact) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(location)
        .bind(email)
        .bind(contact)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn list_ngos(pool: &DbPool) -> anyhow::Result<Vec<Ngo>> {
    let rows = sqlx::query("SELECT id, name, location, email, contact FROM ngos ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(ngo_from_row).collect()
}

/// NGOs at one location in stable directory order (ascending id). The
/// routing engine relies on this ordering being deterministic.
pub async fn ngos_in_location<'e, E>(ex: E, location: &str) -> anyhow::Result<Vec<Ngo>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT id, name, location, email, contact FROM ngos WHERE location = ? ORDER BY id ASC",
    )
    .bind(location)
    .fetch_all(ex)
    .await?;
    rows.iter().map(ngo_from_row).collect()
}

pub async fn first_ngo_in_location<'e, E>(ex: E, location: &str) -> anyhow::Result<Option<Ngo>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, name, location, email, contact FROM ngos WHERE location = ? ORDER BY id ASC LIMIT 1",
    )
    .bind(location)
    .fetch_optional(ex)
    .await?;
    row.as_ref().map(ngo_from_row).transpose()
}

pub async fn first_ngo<'e, E>(ex: E) -> anyhow::Result<Option<Ngo>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT id, name, location, email, contact FROM ngos ORDER BY id ASC LIMIT 1")
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(ngo_from_row).transpose()
}

pub async fn find_ngo_by_name<'e, E>(ex: E, name: &str) -> anyhow::Result<Option<Ngo>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT id, name, location, email, contact FROM ngos WHERE name = ?")
        .bind(name)
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(ngo_from_row).transpose()
}

fn ngo_from_row(row: &SqliteRow) -> anyhow::Result<Ngo> {
    Ok(Ngo {
        id: row.get("id"),
        name: row.get("name"),
        location: row.get("location"),
        email: row.get("email"),
        contact: row.get("contact"),
    })
}

// ---------------------------------------------------------------------------
// Donation records
// ---------------------------------------------------------------------------

pub async fn create_request<'e, E>(ex: E, input: &DonationInput) -> anyhow::Result<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r"
        INSERT INTO requests (restaurant, contact, location, food_type, quantity, expiry, email, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&input.restaurant)
    .bind(&input.contact)
    .bind(&input.location)
    .bind(&input.food_type)
    .bind(input.quantity)
    .bind(&input.expiry)
    .bind(&input.email)
    .bind(&input.notes)
    .execute(ex)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_request<'e, E>(ex: E, id: i64) -> anyhow::Result<Option<DonationRecord>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM requests WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

/// All donation records, newest first, with history expanded.
pub async fn list_requests(pool: &DbPool) -> anyhow::Result<Vec<DonationRecord>> {
    let rows = sqlx::query("SELECT * FROM requests ORDER BY id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(record_from_row).collect()
}

/// Moves a record to a new assignment in one statement: status, currently
/// assigned NGO, and the structured contacted set change together.
pub async fn update_routing_state<'e, E>(
    ex: E,
    id: i64,
    status: DonationStatus,
    ngo_assigned: &str,
    contacted: &[String],
) -> anyhow::Result<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query("UPDATE requests SET status = ?, ngo_assigned = ?, contacted = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(ngo_assigned)
        .bind(serde_json::to_string(contacted)?)
        .bind(id)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn set_status<'e, E>(ex: E, id: i64, status: DonationStatus) -> anyhow::Result<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query("UPDATE requests SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(ex)
        .await?;
    Ok(())
}

/// Appends a timestamped event to a record's history log. There is no edit
/// or delete counterpart. The append is one statement, so concurrent
/// appends on the same record cannot lose an entry; callers mid-transition
/// pass their open transaction so the event lands atomically with the state
/// change it describes.
pub async fn append_event<'e, E>(ex: E, id: i64, event: &str) -> anyhow::Result<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE requests SET history = json_insert(history, '$[#]', json_object('time', ?, 'event', ?)) WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(event)
    .bind(id)
    .execute(ex)
    .await?;
    if result.rows_affected() == 0 {
        anyhow::bail!("request {id} not found");
    }
    Ok(())
}

fn record_from_row(row: &SqliteRow) -> anyhow::Result<DonationRecord> {
    let status_raw: String = row.get("status");
    let status = DonationStatus::parse(&status_raw)
        .ok_or_else(|| anyhow::anyhow!("unrecognized status '{status_raw}' on request row"))?;
    let contacted: Vec<String> = serde_json::from_str(&row.get::<String, _>("contacted"))?;
    let history: Vec<HistoryEvent> = serde_json::from_str(&row.get::<String, _>("history"))?;

    Ok(DonationRecord {
        id: row.get("id"),
        restaurant: row.get("restaurant"),
        contact: row.get("contact"),
        location: row.get("location"),
        food_type: row.get("food_type"),
        quantity: row.get("quantity"),
        expiry: row.get("expiry"),
        email: row.get("email"),
        notes: row.get("notes"),
        status,
        ngo_assigned: row.get("ngo_assigned"),
        contacted,
        history,
        created_at: row.get("created_at"),
    })
}

// ---------------------------------------------------------------------------
// Restaurants
// ---------------------------------------------------------------------------

pub async fn create_restaurant(
    pool: &DbPool,
    name: &str,
    location: &str,
    email: &str,
    contact: &str,
    password_hash: &str,
) -> anyhow::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO restaurants (name, location, email, contact, password_hash) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(location)
    .bind(email)
    .bind(contact)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn restaurant_email_exists(pool: &DbPool, email: &str) -> anyhow::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM restaurants WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Lookup for login; the stored hash is returned alongside the projection
/// and must not travel further than the verification call.
pub async fn find_restaurant_by_email(
    pool: &DbPool,
    email: &str,
) -> anyhow::Result<Option<(Restaurant, String)>> {
    let row = sqlx::query(
        "SELECT id, name, location, email, contact, password_hash FROM restaurants WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else { return Ok(None) };
    Ok(Some((restaurant_from_row(&row)?, row.get("password_hash"))))
}

/// Used to enrich NGO notifications with the registered profile when the
/// submitting restaurant has an account.
pub async fn find_restaurant_by_name(
    pool: &DbPool,
    name: &str,
) -> anyhow::Result<Option<Restaurant>> {
    let row = sqlx::query("SELECT id, name, location, email, contact FROM restaurants WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(restaurant_from_row).transpose()
}

pub async fn list_restaurants(pool: &DbPool) -> anyhow::Result<Vec<Restaurant>> {
    let rows =
        sqlx::query("SELECT id, name, location, email, contact FROM restaurants ORDER BY name ASC")
            .fetch_all(pool)
            .await?;
    rows.iter().map(restaurant_from_row).collect()
}

fn restaurant_from_row(row: &SqliteRow) -> anyhow::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get("id"),
        name: row.get("name"),
        location: row.get("location"),
        email: row.get("email"),
        contact: row.get("contact"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> DonationInput {
        DonationInput {
            restaurant: "A2B".to_string(),
            contact: "9000000000".to_string(),
            location: "Tambaram".to_string(),
            food_type: "Rice".to_string(),
            quantity: 50,
            expiry: "2h".to_string(),
            email: "a2b@example.org".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn new_request_starts_pending_and_unassigned() {
        let pool = init_memory_pool().await.expect("init pool");
        let id = create_request(&pool, &sample_input()).await.expect("create");

        let record = get_request(&pool, id).await.expect("get").expect("exists");
        assert_eq!(record.status, DonationStatus::Pending);
        assert_eq!(record.ngo_assigned, models::NOT_YET_ASSIGNED);
        assert!(record.contacted.is_empty());
        assert!(record.history.is_empty());
    }

    #[tokio::test]
    async fn history_appends_preserve_order() {
        let pool = init_memory_pool().await.expect("init pool");
        let id = create_request(&pool, &sample_input()).await.expect("create");

        append_event(&pool, id, "first").await.expect("append");
        append_event(&pool, id, "second").await.expect("append");

        let record = get_request(&pool, id).await.expect("get").expect("exists");
        let events: Vec<&str> = record.history.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["first", "second"]);
        assert!(record.history[0].time <= record.history[1].time);

        let missing = append_event(&pool, id + 1, "ghost").await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn location_queries_keep_stable_id_order() {
        let pool = init_memory_pool().await.expect("init pool");
        insert_ngo(&pool, "Zeta Aid", "Tambaram", "z@example.org", "1").await.expect("insert");
        insert_ngo(&pool, "Alpha Aid", "Tambaram", "a@example.org", "2").await.expect("insert");
        insert_ngo(&pool, "Mid Aid", "Guindy", "m@example.org", "3").await.expect("insert");

        let local = ngos_in_location(&pool, "Tambaram").await.expect("query");
        let names: Vec<&str> = local.iter().map(|n| n.name.as_str()).collect();
        // insertion order, not alphabetical
        assert_eq!(names, vec!["Zeta Aid", "Alpha Aid"]);

        let first = first_ngo(&pool).await.expect("query").expect("some");
        assert_eq!(first.name, "Zeta Aid");
    }

    #[tokio::test]
    async fn restaurant_listing_never_carries_hashes() {
        let pool = init_memory_pool().await.expect("init pool");
        create_restaurant(&pool, "A2B", "Tambaram", "a2b@example.org", "9000000000", "salt$hash")
            .await
            .expect("create");

        let listed = list_restaurants(&pool).await.expect("list");
        assert_eq!(listed.len(), 1);
        let json = serde_json::to_value(&listed).expect("serialize");
        assert!(json[0].get("password_hash").is_none());
        assert!(json[0].get("passwordHash").is_none());
    }
}
