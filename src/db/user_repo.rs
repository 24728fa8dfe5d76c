// src/db/user_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    entitlement::Entitlement,
    models::{
        admin::Pagination,
        auth::{AccessLevel, User},
        subscription::PaymentProvider,
    },
};

const USER_COLUMNS: &str = r#"
    id, username, email, name, phone, password_hash,
    nivelacesso, origemassinatura, tipoplano,
    dataassinatura, dataexpiracao, acessovitalicio,
    isactive, created_at, updated_at
"#;

// Dados de um usuário novo (webhook ou bootstrap do admin)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub nivelacesso: AccessLevel,
}

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo e-mail (sem diferenciar maiúsculas)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let maybe_user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let maybe_user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    /// Igual a `find_by_email`, mas trava a linha até o fim da transação.
    pub async fn lock_by_email<'e, E>(&self, executor: E, email: &str) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) FOR UPDATE"
        );
        let maybe_user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(executor)
            .await?;
        Ok(maybe_user)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let maybe_user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(maybe_user)
    }

    pub async fn username_exists<'e, E>(&self, executor: E, username: &str) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    /// Insere o usuário se nenhum outro tiver o mesmo e-mail/username.
    /// `None` quando houve conflito (outro webhook criou antes).
    pub async fn insert_if_absent<'e, E>(
        &self,
        executor: E,
        new_user: &NewUser,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            INSERT INTO users (username, email, name, phone, password_hash, nivelacesso)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.phone)
            .bind(&new_user.password_hash)
            .bind(new_user.nivelacesso)
            .fetch_optional(executor)
            .await?;
        Ok(user)
    }

    // Cria um novo usuário no banco de dados
    // Com tratamento de erro específico para e-mails duplicados.
    pub async fn create_user<'e, E>(&self, executor: E, new_user: &NewUser) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            INSERT INTO users (username, email, name, phone, password_hash, nivelacesso)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.phone)
            .bind(&new_user.password_hash)
            .bind(new_user.nivelacesso)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        if let Some(constraint) = db_err.constraint() {
                            return match constraint {
                                // Índice único em LOWER(email) criado na migration
                                "users_email_lower_key" => AppError::EmailAlreadyExists,
                                _ => AppError::UniqueConstraintViolation(constraint.to_string()),
                            };
                        }
                    }
                }
                e.into()
            })?;

        Ok(user)
    }

    /// Completa nome/telefone só onde ainda estão vazios.
    pub async fn fill_contact<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(name, $2),
                phone = COALESCE(phone, $3),
                updated_at = NOW()
            WHERE id = $1 AND (name IS NULL OR phone IS NULL)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_entitlement<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        entitlement: &Entitlement,
        origem: Option<PaymentProvider>,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let query = format!(
            r#"
            UPDATE users
            SET nivelacesso = $2,
                tipoplano = $3,
                dataassinatura = $4,
                dataexpiracao = $5,
                acessovitalicio = $6,
                origemassinatura = COALESCE($7, origemassinatura),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(entitlement.nivelacesso)
            .bind(entitlement.tipoplano)
            .bind(entitlement.dataassinatura)
            .bind(entitlement.dataexpiracao)
            .bind(entitlement.acessovitalicio)
            .bind(origem)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::UserNotFound)?;
        Ok(user)
    }

    pub async fn update_password<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Listagem paginada para o painel admin.
    pub async fn list(
        &self,
        search: Option<&str>,
        nivel: Option<AccessLevel>,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), AppError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let filter = r#"
            ($1::TEXT IS NULL
                OR LOWER(email) LIKE $1
                OR LOWER(username) LIKE $1
                OR LOWER(COALESCE(name, '')) LIKE $1)
            AND ($2::nivel_acesso IS NULL OR nivelacesso = $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .bind(nivel)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(&pattern)
            .bind(nivel)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Rebaixa todo premium vencido (sem vitalício). Retorna quantos mudaram.
    pub async fn downgrade_overdue<'e, E>(
        &self,
        executor: E,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET nivelacesso = 'free', tipoplano = NULL, updated_at = NOW()
            WHERE nivelacesso = 'premium'
              AND acessovitalicio = FALSE
              AND dataexpiracao IS NOT NULL
              AND dataexpiracao <= $1
            "#,
        )
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
