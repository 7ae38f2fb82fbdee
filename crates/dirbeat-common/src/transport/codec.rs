use crate::protocol::error::Result;
use crate::protocol::{DirRequest, DirResponse};

/// JSON codec for the DIR RPC envelope.
///
/// JSON is the only wire format; the payload of each frame is one encoded
/// [`DirRequest`] or [`DirResponse`].
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &DirRequest) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<DirRequest> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &DirResponse) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<DirResponse> {
        Ok(serde_json::from_slice(data)?)
    }
}
