use std::{fmt, str::FromStr};

/// Generate an enum for a closed set of names, with its `FromStr`,
/// `Display`, and `Serialize` implementations, and the associated
/// constant `NAMES` with all the valid values.
macro_rules! names {
    (
        $(#[$meta:meta])*
        $type:ident, $what:expr,
        $($variant:ident = $name:expr,)*
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Debug)]
        pub enum $type {
            $(
                #[doc = concat!("`", $name, "`.")]
                $variant,
            )*
        }

        impl $type {
            /// List with all valid names.
            pub const NAMES: &'static [&'static str] = &[ $($name),* ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($type::$variant => $name,)*
                }
            }
        }

        impl FromStr for $type {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($type::$variant),)*
                    _ => Err(UnknownName {
                        what: $what,
                        name: s.to_owned(),
                        valid: Self::NAMES,
                    }),
                }
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Unknown {what} {name:?}. Valid values: {}", .valid.join(", "))]
pub struct UnknownName {
    what: &'static str,
    name: String,
    valid: &'static [&'static str],
}

names!(
    /// Products that can be downloaded.
    VariantKind, "flavor",
    Desktop = "desktop",
    Server = "server",
    Netboot = "netboot",
    Budgie = "budgie",
    Kubuntu = "kubuntu",
    Kylin = "kylin",
    Lubuntu = "lubuntu",
    Mate = "mate",
    Studio = "studio",
    Xubuntu = "xubuntu",
);

names!(
    /// CPU architectures of the images.
    Architecture, "architecture",
    Amd64 = "amd64",
    Arm64 = "arm64",
    I386 = "i386",
    Ppc64el = "ppc64el",
    S390x = "s390x",
);

names!(
    /// Kind of media. It is part of the filename of the image.
    MediaClass, "media class",
    Desktop = "desktop",
    Server = "server",
    LiveServer = "live-server",
    Mini = "mini",
    Dvd = "dvd",
);

impl VariantKind {
    /// Human-readable name of the product.
    pub fn display_name(&self) -> &'static str {
        match self {
            VariantKind::Desktop => "Ubuntu Desktop",
            VariantKind::Server => "Ubuntu Server",
            VariantKind::Netboot => "Ubuntu Netboot",
            VariantKind::Budgie => "Ubuntu Budgie",
            VariantKind::Kubuntu => "Kubuntu",
            VariantKind::Kylin => "Ubuntu Kylin",
            VariantKind::Lubuntu => "Lubuntu",
            VariantKind::Mate => "Ubuntu MATE",
            VariantKind::Studio => "Ubuntu Studio",
            VariantKind::Xubuntu => "Xubuntu",
        }
    }

    /// Path segment of the product in the image hosts.
    ///
    /// Server images are published as `ubuntu` once the release is out;
    /// see [`Variant::flavor`](super::Variant::flavor).
    pub(super) fn flavor(&self) -> &'static str {
        match self {
            VariantKind::Desktop => "ubuntu",
            VariantKind::Server => "ubuntu-server",
            VariantKind::Netboot => "netboot",
            VariantKind::Budgie => "ubuntu-budgie",
            VariantKind::Kubuntu => "kubuntu",
            VariantKind::Kylin => "ubuntukylin",
            VariantKind::Lubuntu => "lubuntu",
            VariantKind::Mate => "ubuntu-mate",
            VariantKind::Studio => "ubuntustudio",
            VariantKind::Xubuntu => "xubuntu",
        }
    }

    /// Return `true` if the product is published in `releases.ubuntu.com`.
    pub(super) fn has_release_host(&self) -> bool {
        matches!(self, VariantKind::Desktop | VariantKind::Server)
    }
}

#[test]
fn parse_names() {
    assert_eq!("mate".parse::<VariantKind>().unwrap(), VariantKind::Mate);
    assert_eq!("ppc64el".parse::<Architecture>().unwrap(), Architecture::Ppc64el);
    assert_eq!(MediaClass::LiveServer.to_string(), "live-server");

    let err = "riscv64".parse::<Architecture>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown architecture \"riscv64\". Valid values: amd64, arm64, i386, ppc64el, s390x"
    );
}

#[test]
fn names_are_consistent() {
    for name in VariantKind::NAMES {
        let kind = VariantKind::from_str(name).unwrap();
        assert_eq!(kind.as_str(), *name);
        assert!(!kind.display_name().is_empty());
    }
}
