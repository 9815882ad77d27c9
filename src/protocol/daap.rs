//! Minimal DMAP writer for the `SET_PARAMETER` track-metadata body
//!
//! DMAP items are `tag(4) | length(u32 BE) | value`; track metadata is a
//! `mlit` container of string items.

/// Track title (`minm`)
pub const ITEM_NAME: &[u8; 4] = b"minm";
/// Artist (`asar`)
pub const SONG_ARTIST: &[u8; 4] = b"asar";
/// Album (`asal`)
pub const SONG_ALBUM: &[u8; 4] = b"asal";
/// Listing item container (`mlit`)
pub const LISTING_ITEM: &[u8; 4] = b"mlit";

fn push_item(out: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&u32::try_from(value.len()).unwrap_or(u32::MAX).to_be_bytes());
    out.extend_from_slice(value);
}

/// Encode title/artist/album into an `application/x-dmap-tagged` body
#[must_use]
pub fn encode_track(title: &str, artist: Option<&str>, album: Option<&str>) -> Vec<u8> {
    let mut inner = Vec::with_capacity(64);
    push_item(&mut inner, ITEM_NAME, title.as_bytes());
    if let Some(artist) = artist {
        push_item(&mut inner, SONG_ARTIST, artist.as_bytes());
    }
    if let Some(album) = album {
        push_item(&mut inner, SONG_ALBUM, album.as_bytes());
    }

    let mut out = Vec::with_capacity(inner.len() + 8);
    push_item(&mut out, LISTING_ITEM, &inner);
    out
}
