// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures::Stream;

use crate::error::Result;

/// Turns a "read the next line" operation into a stream of lines.
///
/// The stream ends when `next` yields `None`. An error is yielded once and
/// then ends the stream.
pub(crate) fn line_stream<'a, T, F, Fut>(next: F) -> impl Stream<Item = Result<T>> + 'a
where
    T: 'a,
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = Result<Option<T>>> + 'a,
{
    futures::stream::unfold(Some(next), |state| async move {
        let mut next = state?;
        match next().await {
            Ok(Some(line)) => Some((Ok(line), Some(next))),
            Ok(None) => None,
            Err(error) => Some((Err(error), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::executor::block_on;

    use super::*;
    use crate::error::Error;

    #[test]
    fn stops_at_the_first_none() {
        let mut remaining = vec!["b", "a"];
        let lines: Vec<_> = block_on(line_stream(move || std::future::ready(Ok(remaining.pop()))).collect());
        let lines: Vec<_> = lines.into_iter().map(|line| line.unwrap()).collect();
        assert_eq!(lines, ["a", "b"]);
    }

    #[test]
    fn ends_after_an_error() {
        let mut calls = 0;
        let items: Vec<Result<&str>> = block_on(
            line_stream(move || {
                calls += 1;
                std::future::ready(if calls == 1 { Ok(Some("x")) } else { Err(Error::closed("readline")) })
            })
            .collect(),
        );
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(Error::Closed { .. })));
    }
}
