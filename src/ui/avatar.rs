use rand::seq::SliceRandom;
use rand::Rng;

/// Glyphs a user avatar is picked from, once per run.
pub const USER_AVATARS: &[&str] = &["🧑", "👩", "👨", "🧔", "👵"];

/// The model's avatar in the chat feed.
pub const FALCON_AVATAR: &str = "🦅";

/// Sidebar banners, one picked at start-up.
pub const FALCON_BANNERS: &[&[&str]] = &[
    &[
        r"     __       ",
        r"  __/ o\___   ",
        r" <___   __/   ",
        r"     \_/      ",
    ],
    &[
        r"   \\    //   ",
        r"    \\__//    ",
        r"    ( oo )    ",
        r"     \__/     ",
    ],
    &[
        r"  .-.         ",
        r" (o o)  ~~~   ",
        r"  \_/\_____>  ",
        r"   ^^         ",
    ],
    &[
        r"    _  _      ",
        r"   ( \/ )     ",
        r"  --(oo)--    ",
        r"     VV       ",
    ],
];

/// Avatars chosen for one run of the UI.
#[derive(Debug, Clone)]
pub struct Avatars {
    pub user: &'static str,
    pub falcon: &'static str,
    pub banner: &'static [&'static str],
}

impl Avatars {
    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            user: USER_AVATARS.choose(rng).copied().unwrap_or("🧑"),
            falcon: FALCON_AVATAR,
            banner: FALCON_BANNERS.choose(rng).copied().unwrap_or(&[]),
        }
    }

    pub fn random() -> Self {
        Self::pick(&mut rand::thread_rng())
    }
}
