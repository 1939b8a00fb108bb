use crate::query::annotate::VariantRow;

/// Sort `variants` by position and keep the `[skip, skip + limit)` window.
///
/// The sort is stable, so variants sharing a position keep their order.
/// `limit` of `None` keeps everything after `skip`.
pub fn paginate(variants: &mut Vec<VariantRow>, skip: usize, limit: Option<usize>) {
    variants.sort_by_key(|row| row.pos);

    let start = skip.min(variants.len());
    let end = match limit {
        Some(limit) => start.saturating_add(limit).min(variants.len()),
        None => variants.len(),
    };
    variants.truncate(end);
    variants.drain(..start);
}
