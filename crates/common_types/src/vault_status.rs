use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::ToSql;
use diesel::sql_types;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a vault. Stored as plain text rather than as a
/// database enum type, so new statuses don't require a migration of the
/// column type.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsExpression,
    FromSqlRow,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultStatus {
    Deactivated,
    StandBy,
    Quoting,
    CloseOnly,
}

impl ToSql<sql_types::Text, Pg> for VaultStatus {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Pg>,
    ) -> diesel::serialize::Result {
        let status: &'static str = self.into();
        <str as ToSql<sql_types::Text, Pg>>::to_sql(status, out)
    }
}

impl FromSql<sql_types::Text, Pg> for VaultStatus {
    fn from_sql(bytes: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let status = <String as FromSql<sql_types::Text, Pg>>::from_sql(bytes)?;
        status
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid vault status: {status}").into())
    }
}
