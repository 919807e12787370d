//! Entity persistence used by the fetch cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

use super::DbPool;
use super::tables::Table;
use crate::api::models::{
    Athlete, AthleteStatus, Club, Formation, Highlight, Match, PeriodId, Position, ScoredAthlete,
};
use crate::error::AppError;

/// Storage seam between the sync engine and the relational store.
///
/// Every `store_*` call is one transaction and an idempotent upsert keyed by
/// the entity's natural id, or `(id, period)` for period-scoped entities.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn row_count(&self, table: Table) -> Result<i64, AppError>;

    /// Distinct periods present in `table` within `from..=to`.
    async fn existing_periods(
        &self,
        table: Table,
        from: PeriodId,
        to: PeriodId,
    ) -> Result<BTreeSet<PeriodId>, AppError>;

    async fn has_period(&self, table: Table, period: PeriodId) -> Result<bool, AppError> {
        Ok(self
            .existing_periods(table, period, period)
            .await?
            .contains(&period))
    }

    async fn last_update(&self, table: Table) -> Result<Option<DateTime<Utc>>, AppError>;

    /// Records `at` as the last update of `table`. Never moves the timestamp backwards.
    async fn mark_updated(&self, table: Table, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn store_athletes(&self, period: PeriodId, athletes: &[Athlete])
    -> Result<(), AppError>;
    async fn store_clubs(&self, clubs: &[Club]) -> Result<(), AppError>;
    async fn store_positions(&self, positions: &[Position]) -> Result<(), AppError>;
    async fn store_statuses(&self, statuses: &[AthleteStatus]) -> Result<(), AppError>;
    async fn store_formations(&self, formations: &[Formation]) -> Result<(), AppError>;
    async fn store_matches(&self, period: PeriodId, matches: &[Match]) -> Result<(), AppError>;
    async fn store_scored(
        &self,
        period: PeriodId,
        scored: &BTreeMap<String, ScoredAthlete>,
    ) -> Result<(), AppError>;
    async fn store_highlights(&self, highlights: &[Highlight]) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SqliteSyncStore {
    pool: DbPool,
}

impl SqliteSyncStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn period_column(table: Table) -> Result<&'static str, AppError> {
    if table.is_period_scoped() {
        Ok("rodada_id")
    } else {
        Err(AppError::NotPeriodScoped {
            table: table.name().to_string(),
        })
    }
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn row_count(&self, table: Table) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn existing_periods(
        &self,
        table: Table,
        from: PeriodId,
        to: PeriodId,
    ) -> Result<BTreeSet<PeriodId>, AppError> {
        let column = period_column(table)?;
        let sql = format!(
            "SELECT DISTINCT {column} FROM {} WHERE {column} BETWEEN ? AND ?",
            table.name()
        );
        let periods: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(periods.into_iter().collect())
    }

    async fn last_update(&self, table: Table) -> Result<Option<DateTime<Utc>>, AppError> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT last_update_ms FROM updates_tracking WHERE table_name = ?")
                .bind(table.name())
                .fetch_optional(&self.pool)
                .await?;
        Ok(millis.and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    async fn mark_updated(&self, table: Table, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO updates_tracking (table_name, last_update_ms) VALUES (?, ?) \
             ON CONFLICT(table_name) DO UPDATE SET \
             last_update_ms = MAX(updates_tracking.last_update_ms, excluded.last_update_ms)",
        )
        .bind(table.name())
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        debug!("Marked {table} updated at {at}");
        Ok(())
    }

    async fn store_athletes(
        &self,
        period: PeriodId,
        athletes: &[Athlete],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let incoming: HashSet<i64> = athletes.iter().map(|a| a.atleta_id).collect();
        let existing: Vec<i64> = sqlx::query_scalar("SELECT atleta_id FROM atletas")
            .fetch_all(&mut *tx)
            .await?;
        let stale: Vec<i64> = existing
            .into_iter()
            .filter(|id| !incoming.contains(id))
            .collect();
        for id in &stale {
            sqlx::query("DELETE FROM atletas WHERE atleta_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if !stale.is_empty() {
            debug!("Removed {} athletes no longer in the market", stale.len());
        }

        for a in athletes {
            sqlx::query(
                "INSERT INTO atletas (atleta_id, rodada_id, clube_id, posicao_id, status_id, \
                 pontos_num, media_num, variacao_num, preco_num, jogos_num, entrou_em_campo, \
                 slug, apelido, nome, foto) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(atleta_id) DO UPDATE SET \
                 rodada_id = excluded.rodada_id, clube_id = excluded.clube_id, \
                 posicao_id = excluded.posicao_id, status_id = excluded.status_id, \
                 pontos_num = excluded.pontos_num, media_num = excluded.media_num, \
                 variacao_num = excluded.variacao_num, preco_num = excluded.preco_num, \
                 jogos_num = excluded.jogos_num, entrou_em_campo = excluded.entrou_em_campo, \
                 slug = excluded.slug, apelido = excluded.apelido, nome = excluded.nome, \
                 foto = excluded.foto",
            )
            .bind(a.atleta_id)
            .bind(period)
            .bind(a.clube_id)
            .bind(a.posicao_id)
            .bind(a.status_id)
            .bind(a.pontos_num)
            .bind(a.media_num)
            .bind(a.variacao_num)
            .bind(a.preco_num)
            .bind(a.jogos_num)
            .bind(a.entrou_em_campo)
            .bind(&a.slug)
            .bind(&a.apelido)
            .bind(&a.nome)
            .bind(&a.foto)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn store_clubs(&self, clubs: &[Club]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for c in clubs {
            sqlx::query(
                "INSERT INTO clubes (id, nome, abreviacao, slug, apelido, nome_fantasia, url_editoria) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET nome = excluded.nome, \
                 abreviacao = excluded.abreviacao, slug = excluded.slug, \
                 apelido = excluded.apelido, nome_fantasia = excluded.nome_fantasia, \
                 url_editoria = excluded.url_editoria",
            )
            .bind(c.id)
            .bind(&c.nome)
            .bind(&c.abreviacao)
            .bind(&c.slug)
            .bind(&c.apelido)
            .bind(&c.nome_fantasia)
            .bind(&c.url_editoria)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_positions(&self, positions: &[Position]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for p in positions {
            sqlx::query(
                "INSERT INTO posicoes (id, nome, abreviacao) VALUES (?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET nome = excluded.nome, abreviacao = excluded.abreviacao",
            )
            .bind(p.id)
            .bind(&p.nome)
            .bind(&p.abreviacao)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_statuses(&self, statuses: &[AthleteStatus]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for s in statuses {
            sqlx::query(
                "INSERT INTO status (id, nome) VALUES (?, ?) \
                 ON CONFLICT(id) DO UPDATE SET nome = excluded.nome",
            )
            .bind(s.id)
            .bind(&s.nome)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_formations(&self, formations: &[Formation]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for f in formations {
            let slots = &f.posicoes;
            sqlx::query(
                "INSERT INTO esquemas (esquema_id, nome, ata, gol, lat, mei, tec, zag) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(esquema_id) DO UPDATE SET nome = excluded.nome, \
                 ata = excluded.ata, gol = excluded.gol, lat = excluded.lat, \
                 mei = excluded.mei, tec = excluded.tec, zag = excluded.zag",
            )
            .bind(f.esquema_id)
            .bind(&f.nome)
            .bind(slots.ata)
            .bind(slots.gol)
            .bind(slots.lat)
            .bind(slots.mei)
            .bind(slots.tec)
            .bind(slots.zag)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_matches(&self, period: PeriodId, matches: &[Match]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for m in matches {
            sqlx::query(
                "INSERT INTO partidas (partida_id, rodada_id, clube_casa_id, clube_visitante_id, \
                 placar_oficial_mandante, placar_oficial_visitante, local, partida_data, valida, timestamp) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(partida_id) DO UPDATE SET rodada_id = excluded.rodada_id, \
                 clube_casa_id = excluded.clube_casa_id, \
                 clube_visitante_id = excluded.clube_visitante_id, \
                 placar_oficial_mandante = excluded.placar_oficial_mandante, \
                 placar_oficial_visitante = excluded.placar_oficial_visitante, \
                 local = excluded.local, partida_data = excluded.partida_data, \
                 valida = excluded.valida, timestamp = excluded.timestamp",
            )
            .bind(m.partida_id)
            .bind(period)
            .bind(m.clube_casa_id)
            .bind(m.clube_visitante_id)
            .bind(m.placar_oficial_mandante)
            .bind(m.placar_oficial_visitante)
            .bind(&m.local)
            .bind(&m.partida_data)
            .bind(m.valida)
            .bind(m.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_scored(
        &self,
        period: PeriodId,
        scored: &BTreeMap<String, ScoredAthlete>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = 0usize;
        for (key, s) in scored {
            let Ok(atleta_id) = key.parse::<i64>() else {
                warn!("Skipping scored athlete with non-numeric id {key:?} in period {period}");
                continue;
            };
            let scout = s.scout.clone().unwrap_or_default();
            sqlx::query(
                "INSERT INTO pontuados (atleta_id, rodada_id, clube_id, posicao_id, pontuacao, \
                 entrou_em_campo, apelido, foto, scout_a, scout_ca, scout_cv, scout_de, scout_ds, \
                 scout_fc, scout_fd, scout_ff, scout_fs, scout_g, scout_gs, scout_i, scout_sg) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(atleta_id, rodada_id) DO UPDATE SET \
                 clube_id = excluded.clube_id, posicao_id = excluded.posicao_id, \
                 pontuacao = excluded.pontuacao, entrou_em_campo = excluded.entrou_em_campo, \
                 apelido = excluded.apelido, foto = excluded.foto, \
                 scout_a = excluded.scout_a, scout_ca = excluded.scout_ca, \
                 scout_cv = excluded.scout_cv, scout_de = excluded.scout_de, \
                 scout_ds = excluded.scout_ds, scout_fc = excluded.scout_fc, \
                 scout_fd = excluded.scout_fd, scout_ff = excluded.scout_ff, \
                 scout_fs = excluded.scout_fs, scout_g = excluded.scout_g, \
                 scout_gs = excluded.scout_gs, scout_i = excluded.scout_i, \
                 scout_sg = excluded.scout_sg",
            )
            .bind(atleta_id)
            .bind(period)
            .bind(s.clube_id)
            .bind(s.posicao_id)
            .bind(s.pontuacao)
            .bind(s.entrou_em_campo)
            .bind(&s.apelido)
            .bind(&s.foto)
            .bind(scout.a)
            .bind(scout.ca)
            .bind(scout.cv)
            .bind(scout.de)
            .bind(scout.ds)
            .bind(scout.fc)
            .bind(scout.fd)
            .bind(scout.ff)
            .bind(scout.fs)
            .bind(scout.g)
            .bind(scout.gs)
            .bind(scout.i)
            .bind(scout.sg)
            .execute(&mut *tx)
            .await?;
            stored += 1;
        }
        // Without a single row the period would look fetched on the next gap scan
        if stored == 0 {
            return Err(AppError::api_unexpected_structure(
                format!("No scored athlete with a numeric id in period {period}"),
                format!("atletas/pontuados/{period}"),
            ));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store_highlights(&self, highlights: &[Highlight]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM destaques").execute(&mut *tx).await?;
        for h in highlights {
            sqlx::query(
                "INSERT INTO destaques (atleta_id, posicao, posicao_abreviacao, clube_id, clube, \
                 apelido, preco_editorial, escalacoes) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(atleta_id) DO UPDATE SET posicao = excluded.posicao, \
                 posicao_abreviacao = excluded.posicao_abreviacao, clube_id = excluded.clube_id, \
                 clube = excluded.clube, apelido = excluded.apelido, \
                 preco_editorial = excluded.preco_editorial, escalacoes = excluded.escalacoes",
            )
            .bind(h.atleta.atleta_id)
            .bind(&h.posicao)
            .bind(&h.posicao_abreviacao)
            .bind(h.clube_id)
            .bind(&h.clube)
            .bind(&h.atleta.apelido)
            .bind(h.atleta.preco_editorial)
            .bind(h.escalacoes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_memory_pool;
    use crate::testing_utils::TestDataBuilder;
    use chrono::Duration;

    async fn store() -> SqliteSyncStore {
        SqliteSyncStore::new(init_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_store_matches_twice_leaves_same_state() {
        let store = store().await;
        let matches = TestDataBuilder::matches(4, 3);

        store.store_matches(4, &matches).await.unwrap();
        store.store_matches(4, &matches).await.unwrap();

        assert_eq!(store.row_count(Table::Matches).await.unwrap(), 3);
        assert!(store.has_period(Table::Matches, 4).await.unwrap());
        assert!(!store.has_period(Table::Matches, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_periods_in_range() {
        let store = store().await;
        for period in [1, 2, 4, 9] {
            store
                .store_matches(period, &TestDataBuilder::matches(period, 2))
                .await
                .unwrap();
        }

        let periods = store.existing_periods(Table::Matches, 2, 8).await.unwrap();
        assert_eq!(periods.into_iter().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_existing_periods_rejects_non_period_tables() {
        let store = store().await;
        let result = store.existing_periods(Table::Clubs, 1, 10).await;
        assert!(matches!(result, Err(AppError::NotPeriodScoped { .. })));
    }

    #[tokio::test]
    async fn test_scored_upsert_updates_in_place() {
        let store = store().await;
        let mut scored = TestDataBuilder::scored(3);
        store.store_scored(7, &scored).await.unwrap();

        if let Some(first) = scored.values_mut().next() {
            first.pontuacao = Some(99.0);
        }
        scored.insert("not-a-number".to_string(), TestDataBuilder::scored_athlete(1.0));
        store.store_scored(7, &scored).await.unwrap();

        assert_eq!(store.row_count(Table::Scored).await.unwrap(), 3);
        let max: f64 = sqlx::query_scalar("SELECT MAX(pontuacao) FROM pontuados")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(max, 99.0);
    }

    #[tokio::test]
    async fn test_scored_without_numeric_ids_is_rejected() {
        let store = store().await;
        let mut scored = BTreeMap::new();
        scored.insert("abc".to_string(), TestDataBuilder::scored_athlete(4.0));
        scored.insert("12x".to_string(), TestDataBuilder::scored_athlete(2.5));

        let err = store.store_scored(7, &scored).await.unwrap_err();
        assert!(matches!(err, AppError::ApiUnexpectedStructure { .. }), "{err:?}");
        assert!(
            store
                .existing_periods(Table::Scored, 1, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_athlete_snapshot_removes_departed_athletes() {
        let store = store().await;
        let market = TestDataBuilder::market(5, 3);
        store.store_athletes(10, &market.atletas).await.unwrap();

        let remaining = &market.atletas[..2];
        store.store_athletes(11, remaining).await.unwrap();

        assert_eq!(store.row_count(Table::Athletes).await.unwrap(), 2);
        let periods: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT rodada_id FROM atletas")
            .fetch_all(store.pool())
            .await
            .unwrap();
        assert_eq!(periods, vec![11]);
    }

    #[tokio::test]
    async fn test_highlights_replace_table() {
        let store = store().await;
        store
            .store_highlights(&TestDataBuilder::highlights(5))
            .await
            .unwrap();
        store
            .store_highlights(&TestDataBuilder::highlights(2))
            .await
            .unwrap();
        assert_eq!(store.row_count(Table::Highlights).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_taxonomy_stores_are_idempotent() {
        let store = store().await;
        let market = TestDataBuilder::market(0, 20);
        let clubs: Vec<Club> = market.clubes.values().cloned().collect();
        let positions: Vec<Position> = market.posicoes.values().cloned().collect();
        let statuses: Vec<AthleteStatus> = market.status.values().cloned().collect();
        let formations = TestDataBuilder::formations();

        for _ in 0..2 {
            store.store_clubs(&clubs).await.unwrap();
            store.store_positions(&positions).await.unwrap();
            store.store_statuses(&statuses).await.unwrap();
            store.store_formations(&formations).await.unwrap();
        }

        assert_eq!(store.row_count(Table::Clubs).await.unwrap(), 20);
        assert_eq!(
            store.row_count(Table::Positions).await.unwrap(),
            positions.len() as i64
        );
        assert_eq!(
            store.row_count(Table::Statuses).await.unwrap(),
            statuses.len() as i64
        );
        assert_eq!(
            store.row_count(Table::Formations).await.unwrap(),
            formations.len() as i64
        );
    }

    #[tokio::test]
    async fn test_mark_updated_is_monotonic() {
        let store = store().await;
        let now = DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();

        assert_eq!(store.last_update(Table::Clubs).await.unwrap(), None);

        store.mark_updated(Table::Clubs, now).await.unwrap();
        store
            .mark_updated(Table::Clubs, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(store.last_update(Table::Clubs).await.unwrap(), Some(now));

        let later = now + Duration::minutes(5);
        store.mark_updated(Table::Clubs, later).await.unwrap();
        assert_eq!(store.last_update(Table::Clubs).await.unwrap(), Some(later));
    }
}
