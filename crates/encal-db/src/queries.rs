//! Query operations over the calibration tables

use crate::schema::{validate_points, GmsRunTime, GraphPointRow, PointShape};
use crate::{DbClient, DbError, DbResult};
use tracing::{debug, instrument};

impl DbClient {
    /// Insert a new (empty) graph record and return its assigned id.
    ///
    /// The id comes from the insert statement's own result, so it is the
    /// one minted by this call even when other connections insert
    /// concurrently.
    #[instrument(skip(self))]
    pub async fn new_graph(&self, description: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO graphs (text_description) VALUES (?)")
            .bind(description)
            .execute(self.pool())
            .await?;

        let graph_id = result.last_insert_id() as i64;
        debug!(graph_id, "created graph record");
        Ok(graph_id)
    }

    /// Upload a new graph with its points, returning the assigned id.
    ///
    /// The point shape is validated before anything is written, and the
    /// graph record plus all points are inserted in one transaction, so an
    /// invalid upload never leaves an empty graph row behind.
    #[instrument(skip(self, points))]
    pub async fn upload_graph(&self, description: &str, points: &[Vec<f64>]) -> DbResult<i64> {
        let shape = validate_points(points)?;

        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("INSERT INTO graphs (text_description) VALUES (?)")
            .bind(description)
            .execute(&mut *tx)
            .await?;
        let graph_id = result.last_insert_id() as i64;

        for point in points {
            match shape {
                PointShape::WithErrors => {
                    sqlx::query(
                        r#"
                        INSERT INTO graph_points (graph_id, x_value, x_error, y_value, y_error)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(graph_id)
                    .bind(point[0])
                    .bind(point[1])
                    .bind(point[2])
                    .bind(point[3])
                    .execute(&mut *tx)
                    .await?;
                }
                PointShape::Bare => {
                    sqlx::query(
                        r#"
                        INSERT INTO graph_points (graph_id, x_value, y_value)
                        VALUES (?, ?, ?)
                        "#,
                    )
                    .bind(graph_id)
                    .bind(point[0])
                    .bind(point[1])
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        debug!(graph_id, points = points.len(), "uploaded graph");
        Ok(graph_id)
    }

    /// Delete a graph and all of its points.
    ///
    /// Both deletes run in one transaction so an interruption cannot leave
    /// orphaned points. Deleting an unknown id is a no-op.
    #[instrument(skip(self))]
    pub async fn delete_graph(&self, graph_id: i64) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        let points = sqlx::query("DELETE FROM graph_points WHERE graph_id = ?")
            .bind(graph_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM graphs WHERE graph_id = ?")
            .bind(graph_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(graph_id, points = points.rows_affected(), "deleted graph");
        Ok(())
    }

    /// Get all points of a graph. Row order follows storage order; no
    /// explicit ordering is defined for graph points. Returns an empty
    /// vector for an unknown id.
    #[instrument(skip(self))]
    pub async fn get_graph(&self, graph_id: i64) -> DbResult<Vec<GraphPointRow>> {
        let points = sqlx::query_as::<_, GraphPointRow>(
            r#"
            SELECT x_value, x_error, y_value, y_error
            FROM graph_points
            WHERE graph_id = ?
            "#,
        )
        .bind(graph_id)
        .fetch_all(self.pool())
        .await?;

        debug!(graph_id, points = points.len(), "fetched graph");
        Ok(points)
    }

    /// Get run numbers of the given types within an inclusive range.
    ///
    /// Results are unioned across types and sorted ascending; a run listed
    /// under two requested types contributes two entries.
    #[instrument(skip(self, types))]
    pub async fn get_run_type<S: AsRef<str>>(
        &self,
        types: &[S],
        run_min: i32,
        run_max: i32,
    ) -> DbResult<Vec<i32>> {
        let mut runs = Vec::new();

        for run_type in types {
            let mut matched: Vec<i32> = sqlx::query_scalar(
                r#"
                SELECT run_number FROM run
                WHERE run_type = ? AND run_number BETWEEN ? AND ?
                "#,
            )
            .bind(run_type.as_ref())
            .bind(run_min)
            .bind(run_max)
            .fetch_all(self.pool())
            .await?;

            runs.append(&mut matched);
        }

        runs.sort_unstable();
        debug!(runs = runs.len(), run_min, run_max, "selected runs by type");
        Ok(runs)
    }

    /// Get the start time of one run as Unix epoch seconds.
    /// Fails with [`DbError::NotFound`] when the run does not exist.
    #[instrument(skip(self))]
    pub async fn get_run_start_time(&self, run_number: i32) -> DbResult<i64> {
        let start_time: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT CAST(UNIX_TIMESTAMP(start_time) AS SIGNED)
            FROM run
            WHERE run_number = ?
            "#,
        )
        .bind(run_number)
        .fetch_optional(self.pool())
        .await?;

        start_time.ok_or(DbError::NotFound)
    }

    /// Get all GMS run numbers, ascending
    #[instrument(skip(self))]
    pub async fn get_gms_runs(&self) -> DbResult<Vec<i32>> {
        let runs = sqlx::query_scalar("SELECT gms_run FROM energy_calibration ORDER BY gms_run ASC")
            .fetch_all(self.pool())
            .await?;

        Ok(runs)
    }

    /// Get start times for all GMS runs, ordered ascending by GMS run
    /// number so each row pairs positionally with [`get_gms_runs`] output.
    ///
    /// [`get_gms_runs`]: DbClient::get_gms_runs
    #[instrument(skip(self))]
    pub async fn get_gms_run_times(&self) -> DbResult<Vec<GmsRunTime>> {
        let rows = sqlx::query_as::<_, GmsRunTime>(
            r#"
            SELECT ec.gms_run AS run_number,
                   CAST(UNIX_TIMESTAMP(r.start_time) AS SIGNED) AS start_time
            FROM energy_calibration ec
            JOIN run r ON r.run_number = ec.gms_run
            ORDER BY ec.gms_run ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
