/// Every ordered pair `(a, b)` of distinct positions in `items` where both
/// elements satisfy `pred`. Equal elements at different positions still pair.
pub fn ordered_pairs<'a, T, P>(
    items: &'a [T],
    pred: P,
) -> impl Iterator<Item = (&'a T, &'a T)> + 'a
where
    P: Fn(&T) -> bool + 'a,
{
    let selected: Vec<(usize, &'a T)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| pred(*item))
        .collect();
    let outer = selected.clone();

    outer.into_iter().flat_map(move |(i, first)| {
        selected
            .clone()
            .into_iter()
            .filter(move |(j, _)| *j != i)
            .map(move |(_, second)| (first, second))
    })
}
