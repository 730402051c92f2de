use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use pharmacy_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@pharmacy.example", "admin123", "admin").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = [
        ("Pain Relief", "Analgesics and anti-inflammatories"),
        ("Cold & Flu", "Decongestants, cough syrups, lozenges"),
        ("First Aid", "Bandages, antiseptics, dressings"),
    ];

    for (name, desc) in categories {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .execute(pool)
        .await?;
    }

    let pain_relief: (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
        .bind("Pain Relief")
        .fetch_one(pool)
        .await?;

    let product_id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO products (id, category_id, name, description, base_price, is_popular)
        SELECT $1, $2, $3, $4, $5, $6
        WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $3)
        "#,
    )
    .bind(product_id)
    .bind(pain_relief.0)
    .bind("Paracetamol")
    .bind("Paracetamol tablets for pain and fever")
    .bind(0_i64)
    .bind(true)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        let variants = [("500mg x 20", 350_i64, 80), ("1000mg x 10", 420_i64, 40)];
        for (name, price, stock) in variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, name, price, stock)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product_id, name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(name)
            .bind(price)
            .bind(stock)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded catalog");
    Ok(())
}
