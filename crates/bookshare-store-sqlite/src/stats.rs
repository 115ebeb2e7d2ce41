//! [`StatisticsStore`] for [`SqliteStore`]. Aggregation happens in SQL;
//! ranking and tie-breaking happen in `bookshare_core::stats`.

use bookshare_core::{
  stats::{average, most_popular_genre, BookRating, CatalogStatistics, GenreCount},
  store::StatisticsStore,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::{
  encode::{decode_dt, decode_uuid, encode_uuid},
  store::SqliteStore,
  Result,
};

fn count(conn: &Connection, sql: &str) -> Result<u64> {
  let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
  Ok(n as u64)
}

fn query_genre_counts(conn: &Connection) -> Result<Vec<GenreCount>> {
  let mut stmt = conn.prepare(
    "SELECT g.genre_id, g.name, COUNT(bg.book_id)
     FROM genres g
     LEFT JOIN book_genres bg ON bg.genre_id = g.genre_id
     GROUP BY g.genre_id, g.name
     ORDER BY g.name",
  )?;
  let rows = stmt
    .query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(id, name, n)| {
      Ok(GenreCount { genre_id: decode_uuid(&id)?, name, book_count: n as u64 })
    })
    .collect()
}

impl StatisticsStore for SqliteStore {
  async fn catalog_statistics(&self) -> Result<CatalogStatistics> {
    self
      .with_conn(|conn| {
        let (reviews, rating_sum): (i64, i64) = conn.query_row(
          "SELECT COUNT(*), COALESCE(SUM(rating), 0) FROM reviews",
          [],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let genres = query_genre_counts(conn)?;

        Ok(CatalogStatistics {
          total_books:        count(conn, "SELECT COUNT(*) FROM books")?,
          total_reviews:      reviews as u64,
          total_genres:       genres.len() as u64,
          total_messages:     count(conn, "SELECT COUNT(*) FROM messages")?,
          total_profiles:     count(conn, "SELECT COUNT(*) FROM profiles")?,
          books_with_files:   count(
            conn,
            "SELECT COUNT(*) FROM books WHERE book_file IS NOT NULL AND book_file <> ''",
          )?,
          average_rating:     average(rating_sum as u64, reviews as u64),
          most_popular_genre: most_popular_genre(&genres),
        })
      })
      .await
  }

  async fn average_rating(&self, book_id: Uuid) -> Result<f64> {
    self
      .with_conn(move |conn| {
        let (n, sum): (i64, i64) = conn.query_row(
          "SELECT COUNT(*), COALESCE(SUM(rating), 0) FROM reviews WHERE book_id = ?1",
          params![encode_uuid(book_id)],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(average(sum as u64, n as u64))
      })
      .await
  }

  async fn book_ratings(&self) -> Result<Vec<BookRating>> {
    self
      .with_conn(|conn| {
        let mut stmt = conn.prepare(
          "SELECT b.book_id, b.title, b.author, b.created_at,
                  COUNT(r.review_id), COALESCE(SUM(r.rating), 0)
           FROM books b
           LEFT JOIN reviews r ON r.book_id = b.book_id
           GROUP BY b.book_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok((
              row.get::<_, String>(0)?,
              row.get::<_, String>(1)?,
              row.get::<_, String>(2)?,
              row.get::<_, String>(3)?,
              row.get::<_, i64>(4)?,
              row.get::<_, i64>(5)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        rows
          .into_iter()
          .map(|(id, title, author, created_at, n, sum)| {
            Ok(BookRating::new(
              decode_uuid(&id)?,
              title,
              author,
              decode_dt(&created_at)?,
              n as u64,
              sum as u64,
            ))
          })
          .collect()
      })
      .await
  }

  async fn genre_counts(&self) -> Result<Vec<GenreCount>> {
    self.with_conn(query_genre_counts).await
  }
}
