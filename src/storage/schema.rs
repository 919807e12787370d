//! Table definitions. Every statement is idempotent.

use tracing::debug;

use super::DbPool;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS clubes (
        id INTEGER PRIMARY KEY,
        nome TEXT,
        abreviacao TEXT,
        slug TEXT,
        apelido TEXT,
        nome_fantasia TEXT,
        url_editoria TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS posicoes (
        id INTEGER PRIMARY KEY,
        nome TEXT,
        abreviacao TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS status (
        id INTEGER PRIMARY KEY,
        nome TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS atletas (
        atleta_id INTEGER PRIMARY KEY,
        rodada_id INTEGER,
        clube_id INTEGER,
        posicao_id INTEGER,
        status_id INTEGER,
        pontos_num REAL,
        media_num REAL,
        variacao_num REAL,
        preco_num REAL,
        jogos_num INTEGER,
        entrou_em_campo INTEGER,
        slug TEXT,
        apelido TEXT,
        nome TEXT,
        foto TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS esquemas (
        esquema_id INTEGER PRIMARY KEY,
        nome TEXT,
        ata INTEGER,
        gol INTEGER,
        lat INTEGER,
        mei INTEGER,
        tec INTEGER,
        zag INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS partidas (
        partida_id INTEGER PRIMARY KEY,
        rodada_id INTEGER NOT NULL,
        clube_casa_id INTEGER,
        clube_visitante_id INTEGER,
        placar_oficial_mandante INTEGER,
        placar_oficial_visitante INTEGER,
        local TEXT,
        partida_data TEXT,
        valida INTEGER,
        timestamp INTEGER
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_partidas_rodada ON partidas (rodada_id)",
    r#"CREATE TABLE IF NOT EXISTS pontuados (
        atleta_id INTEGER NOT NULL,
        rodada_id INTEGER NOT NULL,
        clube_id INTEGER,
        posicao_id INTEGER,
        pontuacao REAL,
        entrou_em_campo INTEGER,
        apelido TEXT,
        foto TEXT,
        scout_a INTEGER DEFAULT 0,
        scout_ca INTEGER DEFAULT 0,
        scout_cv INTEGER DEFAULT 0,
        scout_de INTEGER DEFAULT 0,
        scout_ds INTEGER DEFAULT 0,
        scout_fc INTEGER DEFAULT 0,
        scout_fd INTEGER DEFAULT 0,
        scout_ff INTEGER DEFAULT 0,
        scout_fs INTEGER DEFAULT 0,
        scout_g INTEGER DEFAULT 0,
        scout_gs INTEGER DEFAULT 0,
        scout_i INTEGER DEFAULT 0,
        scout_sg INTEGER DEFAULT 0,
        PRIMARY KEY (atleta_id, rodada_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_pontuados_rodada ON pontuados (rodada_id)",
    r#"CREATE TABLE IF NOT EXISTS destaques (
        atleta_id INTEGER PRIMARY KEY,
        posicao TEXT,
        posicao_abreviacao TEXT,
        clube_id INTEGER,
        clube TEXT,
        apelido TEXT,
        preco_editorial REAL,
        escalacoes INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS updates_tracking (
        table_name TEXT PRIMARY KEY,
        last_update_ms INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS credenciais (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        env_key TEXT NOT NULL UNIQUE,
        access_token TEXT,
        refresh_token TEXT,
        id_token TEXT,
        estrategia INTEGER NOT NULL DEFAULT 1,
        essential_cookies TEXT,
        last_refreshed_ms INTEGER
    )"#,
];

/// Creates every table and index that does not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("Schema verified ({} statements)", SCHEMA.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_memory_pool;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_memory_pool().await.unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "atletas",
                "clubes",
                "credenciais",
                "destaques",
                "esquemas",
                "partidas",
                "pontuados",
                "posicoes",
                "status",
                "updates_tracking"
            ]
        );
    }
}
