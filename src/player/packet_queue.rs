use crate::player::backend::MediaPacket;
use log::warn;
use std::collections::VecDeque;

/// 单条流的压缩数据包队列（FIFO）
///
/// 只有生产者线程（解封装 + 解码）会访问，因此没有内部锁。
/// `is_full` 是软上限，仅用于解封装节流，不限制实际分配。
pub struct PacketQueue<P: MediaPacket> {
    packets: VecDeque<P>,
    limit: usize,
}

impl<P: MediaPacket> PacketQueue<P> {
    pub fn new(limit: usize) -> Self {
        Self {
            packets: VecDeque::new(),
            limit,
        }
    }

    /// 引用数据包并追加到队尾，无法引用时记录日志并丢弃
    pub fn push_back(&mut self, packet: &P) {
        match packet.try_ref() {
            Some(packet) => self.packets.push_back(packet),
            None => warn!(
                "无法引用数据包（stream {}，{} 字节），已丢弃",
                packet.stream_index(),
                packet.size()
            ),
        }
    }

    /// 移除队首数据包并释放引用
    pub fn pop_front(&mut self) -> Option<P> {
        debug_assert!(!self.packets.is_empty(), "pop_front on empty packet queue");
        self.packets.pop_front()
    }

    /// 队首数据包
    pub fn front(&self) -> Option<&P> {
        self.packets.front()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.packets.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        while !self.packets.is_empty() {
            self.pop_front();
        }
    }
}
