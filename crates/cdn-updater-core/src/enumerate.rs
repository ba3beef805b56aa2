//! Collection enumerator
//!
//! Pulls every page of the distribution listing into one vector, following
//! continuation markers until a page carries none.

use crate::error::RemoteError;
use crate::remote::DistributionApi;
use crate::types::{DistributionSummary, ListRequest};

/// Collect all summaries across pages, preserving listing order
///
/// An empty marker ends the listing just like an absent one.
///
/// # Errors
/// Returns the first `RemoteError` raised by a page request
pub async fn collect_pages<A>(api: &A, page_size: u32) -> Result<Vec<DistributionSummary>, RemoteError>
where
    A: DistributionApi + ?Sized,
{
    let mut distributions = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        tracing::debug!(
            "Listing distributions (marker: {:?}, collected: {})",
            marker,
            distributions.len()
        );
        let page = api
            .list_distributions(ListRequest::new(marker.take(), page_size))
            .await?;
        distributions.extend(page.items);

        match page.next_marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => break,
        }
    }

    Ok(distributions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockDistributionApi;
    use crate::types::DistributionPage;
    use mockall::Sequence;

    fn ids(summaries: &[DistributionSummary]) -> Vec<&str> {
        summaries.iter().filter_map(DistributionSummary::id).collect()
    }

    #[tokio::test]
    async fn follows_markers_in_order() {
        let mut mock = MockDistributionApi::new();
        let mut seq = Sequence::new();

        mock.expect_list_distributions()
            .withf(|r| r.marker.is_none() && r.max_items == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(DistributionPage::with_next(
                    vec![DistributionSummary::new("A"), DistributionSummary::new("B")],
                    "m1",
                ))
            });
        mock.expect_list_distributions()
            .withf(|r| r.marker.as_deref() == Some("m1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(DistributionPage::with_next(vec![DistributionSummary::new("C")], "m2"))
            });
        mock.expect_list_distributions()
            .withf(|r| r.marker.as_deref() == Some("m2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(DistributionPage::last(vec![DistributionSummary::new("D")])));

        let all = collect_pages(&mock, 2).await.unwrap();
        assert_eq!(ids(&all), vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn empty_marker_ends_listing() {
        let mut mock = MockDistributionApi::new();
        mock.expect_list_distributions()
            .times(1)
            .returning(|_| Ok(DistributionPage::with_next(vec![DistributionSummary::new("A")], "")));

        let all = collect_pages(&mock, 100).await.unwrap();
        assert_eq!(ids(&all), vec!["A"]);
    }

    #[tokio::test]
    async fn page_errors_propagate() {
        let mut mock = MockDistributionApi::new();
        mock.expect_list_distributions()
            .times(1)
            .returning(|_| Err(RemoteError::Transport("timeout".into())));

        let err = collect_pages(&mock, 100).await.unwrap_err();
        assert_eq!(err, RemoteError::Transport("timeout".into()));
    }
}
