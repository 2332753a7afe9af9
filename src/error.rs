use thiserror::Error;

/// ConfigError はブレーカー構築時の設定不備を表す。構築後に発生することはない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("interval は 0 より大きい値を指定してください")]
    ZeroInterval,
    #[error("cooldown は 0 より大きい値を指定してください")]
    ZeroCooldown,
    #[error("at_least_reqs は 1 以上を指定してください")]
    ZeroAtLeastReqs,
    #[error("to_open ポリシーが指定されていません")]
    MissingToOpen,
    #[error("to_closed ポリシーが指定されていません")]
    MissingToClosed,
}

/// BreakerError は `execute` / `call` の失敗を表す。
///
/// `Open` はブレーカーがリクエストを受け付けなかった場合にのみ返される。
/// 操作自身のエラーは `Inner` にそのまま格納され、表示もそのエラーのものになる。
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("サーキットブレーカーがオープン状態です")]
    Open,
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Open => None,
            Self::Inner(e) => Some(e),
        }
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Inner(e) => Some(e),
        }
    }
}
