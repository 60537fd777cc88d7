use super::block::ShortVideoDescriptor;
use super::capability::VicSet;
use super::descriptor::CtaExtension;

/// VICs of the video data block that the extension marks as 4:2:0 capable.
///
/// An empty capability map marks every entry of the video data block.
#[must_use]
pub fn capable_vics(extension: &CtaExtension) -> VicSet {
    let Some(map) = extension.yuv420_capability_map() else {
        return VicSet::new();
    };
    let video = extension.video().unwrap_or_default();
    video
        .iter()
        .enumerate()
        .filter(|(index, _)| map.is_empty() || is_marked(map, *index))
        .map(|(_, svd)| svd.vic)
        .collect()
}

fn is_marked(map: &[u8], index: usize) -> bool {
    map.get(index / 8)
        .is_some_and(|byte| byte & (1u8 << (index % 8)) != 0)
}

/// Build the capability map for `advertised`, marking the entries in
/// `capable`.
///
/// Returns `None` when nothing is marked, since an empty map would mark
/// every entry.
#[must_use]
pub fn capability_map(
    advertised: &[ShortVideoDescriptor],
    capable: &VicSet,
) -> Option<heapless::Vec<u8, 30>> {
    let mut map = heapless::Vec::<u8, 30>::new();
    for (index, svd) in advertised.iter().enumerate() {
        let byte = index / 8;
        if map.len() <= byte && map.resize(byte + 1, 0).is_err() {
            break;
        }
        if capable.contains(svd.vic) {
            map[byte] |= 1 << (index % 8);
        }
    }
    // Trailing zero bytes carry no information
    while map.last() == Some(&0) {
        map.pop();
    }
    if map.is_empty() { None } else { Some(map) }
}
