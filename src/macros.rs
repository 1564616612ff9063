/// Declares a public newtype over `$type` with `new`, `Deref` and `From` conversions.
///
/// Extra derives are passed as attributes on the name; inherent methods may follow in an
/// `impl { .. }` block.
macro_rules! new_type {
    (
        $(#[$attr:meta])*
        $name:ident($type:ty)
        $(impl {
            $($item:tt)*
        })?
    ) => {
        $(#[$attr])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name($type);
        impl $name {
            #[doc = concat!(
                "Wrap the given `", stringify!($type), "` as a `", stringify!($name), "`."
            )]
            pub const fn new(value: $type) -> Self {
                $name(value)
            }

            $($($item)*)?
        }
        impl std::ops::Deref for $name {
            type Target = $type;
            fn deref(&self) -> &$type {
                &self.0
            }
        }
        impl From<$name> for $type {
            fn from(value: $name) -> $type {
                value.0
            }
        }
    };
}

/// Declares a public URL newtype that keeps the configured string verbatim.
///
/// Equality, hashing and serialization use that string, so `https://idp.example` and
/// `https://idp.example/` are distinct values even though they parse to the same [`url::Url`].
macro_rules! new_url_type {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Clone)]
        pub struct $name {
            parsed: url::Url,
            raw: String,
        }
        impl $name {
            #[doc = concat!("Parse `url` as a `", stringify!($name), "`.")]
            pub fn new(url: String) -> Result<Self, url::ParseError> {
                Ok($name {
                    parsed: url::Url::parse(&url)?,
                    raw: url,
                })
            }

            #[doc = concat!("Wrap an already parsed URL as a `", stringify!($name), "`.")]
            pub fn from_url(url: url::Url) -> Self {
                $name {
                    raw: url.to_string(),
                    parsed: url,
                }
            }

            /// The parsed URL.
            pub fn url(&self) -> &url::Url {
                &self.parsed
            }
        }
        impl std::ops::Deref for $name {
            type Target = String;
            fn deref(&self) -> &String {
                &self.raw
            }
        }
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.raw).finish()
            }
        }
        impl PartialEq for $name {
            fn eq(&self, other: &$name) -> bool {
                self.raw == other.raw
            }
        }
        impl Eq for $name {}
        impl std::hash::Hash for $name {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.raw.hash(state);
            }
        }
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::de::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                $name::new(raw).map_err(serde::de::Error::custom)
            }
        }
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.raw)
            }
        }
    };
}
