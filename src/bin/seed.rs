use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use course_platform_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_admin(&pool, "admin@example.com", "admin123").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_admin(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    ensure_user_with_role(pool, email, password, "admin").await
}

async fn ensure_user(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    ensure_user_with_role(pool, email, password, "user").await
}

async fn ensure_user_with_role(
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

    // If user already exists, fetch id
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
    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        println!("Catalog already seeded, skipping");
        return Ok(());
    }

    let course_id = Uuid::new_v4();
    sqlx::query("INSERT INTO courses (id, name, description) VALUES ($1, $2, $3)")
        .bind(course_id)
        .bind("Async Rust from Scratch")
        .bind("Futures, executors, and real-world async services")
        .execute(pool)
        .await?;

    let sections = [("Getting Started", "public"), ("Building Services", "public")];
    for (order, (name, status)) in sections.iter().enumerate() {
        let section_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO course_sections (id, course_id, name, status, "order")
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(section_id)
        .bind(course_id)
        .bind(name)
        .bind(status)
        .bind(order as i32)
        .execute(pool)
        .await?;

        let lessons = [
            ("Introduction", "preview"),
            ("Core Concepts", "public"),
            ("Hands-on Exercise", "private"),
        ];
        for (lesson_order, (lesson_name, lesson_status)) in lessons.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO lessons (id, section_id, name, status, "order")
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(section_id)
            .bind(lesson_name)
            .bind(lesson_status)
            .bind(lesson_order as i32)
            .execute(pool)
            .await?;
        }
    }

    let product_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, name, description, image_url, price_in_dollars, status, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(product_id)
    .bind("Async Rust Bundle")
    .bind("Full access to the async Rust course")
    .bind("https://example.com/images/async-rust.png")
    .bind(49)
    .bind("public")
    .bind(serde_json::json!(["new", "featured"]))
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO course_products (course_id, product_id) VALUES ($1, $2)")
        .bind(course_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    println!("Seeded catalog");
    Ok(())
}
