use core::fmt;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use diesel::backend::Backend;
use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::Pg;
use diesel::serialize::ToSql;
use diesel::sql_types;
use hex::FromHex;
use quickcheck::Arbitrary;
use serde::{Deserialize, Serialize};

/// A byte sequence that is hex-encoded (with `0x` prefix) in text form and
/// stored as `bytea` in Postgres. Parsing without the `0x` prefix is also
/// allowed.
///
/// Serialized values are what the bulk `binary` caster expects, so rows
/// containing a [`HexString`] can go straight through the bulk synthesizer.
#[derive(
    Clone,
    Default,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsExpression,
    FromSqlRow,
    derive_more::From,
)]
#[diesel(sql_type = sql_types::Binary)]
pub struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> HexString<T> {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<T: AsRef<[u8]>> Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_ref()))
    }
}

impl<T: AsRef<[u8]>> Serialize for HexString<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self)
    }
}

impl<T: FromHex> FromStr for HexString<T> {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        FromHex::from_hex(stripped)
            .map(Self)
            .map_err(|_| "invalid hex string")
    }
}

impl<'a, T: FromHex> Deserialize<'a> for HexString<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<T> ToSql<sql_types::Binary, Pg> for HexString<T>
where
    T: AsRef<[u8]> + Debug,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, Pg>,
    ) -> diesel::serialize::Result {
        ToSql::<sql_types::Binary, Pg>::to_sql(self.0.as_ref(), out)
    }
}

impl<T> FromSql<sql_types::Binary, Pg> for HexString<T>
where
    T: TryFrom<Vec<u8>>,
    T::Error: Debug,
{
    fn from_sql(bytes: <Pg as Backend>::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        T::try_from(FromSql::<sql_types::Binary, Pg>::from_sql(bytes)?)
            .map(HexString)
            .map_err(|e| anyhow::anyhow!("{:?}", e).into())
    }
}

impl<T: Arbitrary> Arbitrary for HexString<T> {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self(T::arbitrary(g))
    }
}
